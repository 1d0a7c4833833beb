//! Drag-fill controller: extends one cell's value across a row range.
//!
//! Pointer movement only moves the target row and marks the state dirty.
//! Ledger writes happen in `flush`, which the host drives at most once
//! per frame, so a fast drag costs one ledger pass per frame instead of
//! one per pointer event. Backing the drag out of a row restores that
//! row's pre-drag value from a per-drag snapshot captured at first
//! touch.

use gridflux_core::address::{CellAddress, ColumnKey, RowRange};
use gridflux_core::record::RowSet;
use gridflux_core::value::FieldValue;
use rustc_hash::FxHashMap;

use crate::ledger::ChangeLedger;

/// Summary of one applied drag-fill pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DragPass {
    pub column: ColumnKey,
    pub range: RowRange,
    /// Live cells whose value changed during this pass.
    pub cells_changed: usize,
}

/// Fill-handle drag state. At most one drag is active at a time.
#[derive(Debug)]
pub enum DragFill {
    Idle,
    Active {
        column: ColumnKey,
        anchor_row: usize,
        current_row: usize,
        /// Source cell value being extended.
        value: FieldValue,
        /// Pre-drag value of every row the drag has touched.
        snapshot: FxHashMap<usize, FieldValue>,
        /// Range written by the previous flush.
        applied: Option<RowRange>,
        dirty: bool,
    },
}

impl Default for DragFill {
    fn default() -> Self {
        DragFill::Idle
    }
}

impl DragFill {
    pub fn new() -> Self {
        DragFill::Idle
    }

    pub fn is_active(&self) -> bool {
        matches!(self, DragFill::Active { .. })
    }

    pub fn column(&self) -> Option<&ColumnKey> {
        match self {
            DragFill::Active { column, .. } => Some(column),
            DragFill::Idle => None,
        }
    }

    pub fn range(&self) -> Option<RowRange> {
        match self {
            DragFill::Active {
                anchor_row,
                current_row,
                ..
            } => Some(RowRange::new(*anchor_row, *current_row)),
            DragFill::Idle => None,
        }
    }

    /// Start a drag from the fill handle of `(row, column)`. Returns
    /// false (staying idle) when the source row does not exist.
    pub fn begin(&mut self, rows: &RowSet, row: usize, column: ColumnKey) -> bool {
        if rows.get(row).is_none() {
            return false;
        }
        let value = rows.value(row, &column);
        let mut snapshot = FxHashMap::default();
        snapshot.insert(row, value.clone());
        *self = DragFill::Active {
            column,
            anchor_row: row,
            current_row: row,
            value,
            snapshot,
            applied: None,
            dirty: true,
        };
        true
    }

    /// Move the drag target. Cheap: no ledger writes until `flush`.
    /// Returns whether the target actually moved.
    pub fn update(&mut self, target_row: usize) -> bool {
        let DragFill::Active {
            current_row, dirty, ..
        } = self
        else {
            return false;
        };
        if *current_row == target_row {
            return false;
        }
        *current_row = target_row;
        *dirty = true;
        true
    }

    /// Apply coalesced movement: restore rows the drag backed out of,
    /// then fill the current range through the ledger. Returns None when
    /// nothing moved since the last flush.
    pub fn flush(&mut self, rows: &mut RowSet, ledger: &mut ChangeLedger) -> Option<DragPass> {
        let DragFill::Active {
            column,
            anchor_row,
            current_row,
            value,
            snapshot,
            applied,
            dirty,
        } = self
        else {
            return None;
        };
        if !*dirty {
            return None;
        }
        *dirty = false;

        let range = RowRange::new(*anchor_row, *current_row);
        let mut cells_changed = 0;

        if let Some(prev) = *applied {
            for row in prev.rows() {
                if range.contains(row) {
                    continue;
                }
                let Some(before) = snapshot.get(&row).cloned() else {
                    continue;
                };
                // Rows deleted mid-drag no longer have anything to restore.
                if let Ok(true) =
                    ledger.record_edit(rows, CellAddress::new(row, column.clone()), before)
                {
                    cells_changed += 1;
                }
            }
        }

        for row in range.rows() {
            if !snapshot.contains_key(&row) && rows.get(row).is_some() {
                snapshot.insert(row, rows.value(row, column));
            }
        }

        cells_changed += ledger.record_drag_fill(rows, range, column, value).len();
        *applied = Some(range);

        Some(DragPass {
            column: column.clone(),
            range,
            cells_changed,
        })
    }

    /// Reconcile drag state after the host removed a row mid-drag: the
    /// removed row's snapshot entry is dropped, entries and range
    /// endpoints above it shift down one slot. The drag itself continues;
    /// the next flush re-applies the corrected range.
    pub fn reconcile_removed_row(&mut self, row: usize) {
        let DragFill::Active {
            anchor_row,
            current_row,
            snapshot,
            applied,
            dirty,
            ..
        } = self
        else {
            return;
        };
        if *anchor_row > row {
            *anchor_row -= 1;
        }
        if *current_row > row {
            *current_row -= 1;
        }
        snapshot.remove(&row);
        let entries: Vec<(usize, FieldValue)> = snapshot.drain().collect();
        for (r, value) in entries {
            snapshot.insert(if r > row { r - 1 } else { r }, value);
        }
        if let Some(range) = applied {
            let start = if range.start > row { range.start - 1 } else { range.start };
            let end = if range.end > row { range.end - 1 } else { range.end };
            *applied = Some(RowRange::new(start, end));
        }
        *dirty = true;
    }

    /// End the drag: apply any coalesced movement, then return to idle.
    /// Returns the final pass summary, or None if no drag was active.
    pub fn finish(&mut self, rows: &mut RowSet, ledger: &mut ChangeLedger) -> Option<DragPass> {
        let last = self.flush(rows, ledger);
        let state = std::mem::replace(self, DragFill::Idle);
        let DragFill::Active {
            column,
            anchor_row,
            current_row,
            ..
        } = state
        else {
            return None;
        };
        Some(last.unwrap_or_else(|| DragPass {
            column,
            range: RowRange::new(anchor_row, current_row),
            cells_changed: 0,
        }))
    }
}
