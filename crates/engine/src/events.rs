//! Event types for grid change notifications.
//!
//! Hosts register one callback on `Grid` and receive these events instead
//! of threading listeners through every subsystem. The collector is used
//! by tests to verify event ordering and batching.

use gridflux_core::address::{CellAddress, ColumnKey, RowRange};
use gridflux_core::record::ItemId;

/// Events emitted by `Grid` as state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    /// One cell's pending value changed through a direct edit.
    CellEdited(CellEditedEvent),

    /// A drag fill applied one coalesced pass over its target range.
    /// Emitted at most once per frame flush, and once more on drag end.
    DragFillApplied(DragFillAppliedEvent),

    /// All pending changes were flushed to the commit sink.
    Committed(CommittedEvent),

    /// The commit sink rejected the batch; the ledger is unchanged.
    CommitFailed(CommitFailedEvent),

    /// All pending changes were reverted to their session-old values.
    Cancelled(CancelledEvent),

    /// A gated auto-fill batch was deferred; the row awaits confirmation.
    ConfirmationRequested(ConfirmationRequestedEvent),

    /// A row's deferred auto-fill was confirmed and applied.
    ConfirmationResolved(ConfirmationResolvedEvent),

    /// A column filter changed and the visible row set was rebuilt.
    FilterChanged(FilterChangedEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellEditedEvent {
    pub address: CellAddress,
    /// Ledger size after the edit (an edit back to the session-old value
    /// shrinks it).
    pub pending_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragFillAppliedEvent {
    pub column: ColumnKey,
    pub range: RowRange,
    /// Cells whose live value changed in this pass.
    pub cells_changed: usize,
    /// True for the single batched notification on drag end.
    pub finished: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommittedEvent {
    /// Number of changes flushed to the sink.
    pub changes: usize,
    /// Per-row patch failures reported by the sink. These do NOT restore
    /// the ledger; they are the host's concern.
    pub row_failures: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitFailedEvent {
    pub message: String,
    /// Number of entries retained in the ledger for retry.
    pub retained: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelledEvent {
    /// Number of entries reverted.
    pub reverted: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationRequestedEvent {
    pub item_id: ItemId,
    pub row: usize,
    /// Target columns whose derived values are waiting on confirmation.
    pub deferred_targets: Vec<ColumnKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationResolvedEvent {
    pub item_id: ItemId,
    /// Number of derived updates applied on confirmation.
    pub applied: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterChangedEvent {
    /// The column whose filter changed; None when all filters were cleared.
    pub column: Option<ColumnKey>,
    /// Visible row count after the rebuild.
    pub visible: usize,
}

/// Callback type for receiving grid events.
///
/// The grid is single-threaded; the callback runs synchronously inside
/// the mutating call that produced the event.
pub type EventCallback = Box<dyn FnMut(GridEvent)>;

/// Simple event collector for testing.
#[derive(Default)]
pub struct EventCollector {
    events: Vec<GridEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: GridEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[GridEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn cell_edited(&self) -> Vec<&CellEditedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::CellEdited(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn drag_fill_applied(&self) -> Vec<&DragFillAppliedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::DragFillApplied(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn committed(&self) -> Vec<&CommittedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::Committed(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn commit_failed(&self) -> Vec<&CommitFailedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::CommitFailed(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn cancelled(&self) -> Vec<&CancelledEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::Cancelled(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn confirmation_requested(&self) -> Vec<&ConfirmationRequestedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::ConfirmationRequested(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn confirmation_resolved(&self) -> Vec<&ConfirmationResolvedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::ConfirmationResolved(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn filter_changed(&self) -> Vec<&FilterChangedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::FilterChanged(f) => Some(f),
                _ => None,
            })
            .collect()
    }
}
