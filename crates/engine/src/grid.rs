//! The owning context for one grid instance.
//!
//! `Grid` ties the subsystems together: edits validate, then write
//! through the change ledger, then feed the dependency resolver; filter
//! selections rebuild the visibility view; the window index maps scroll
//! state to the rows worth materializing. Each `Grid` owns its own
//! subsystem instances, so multiple grids on one page share nothing.
//!
//! Frame pacing: pointer movement and scrolling only mark state. The
//! host calls `frame_tick` once per animation frame to apply coalesced
//! drag movement and recompute the visible window.

use std::ops::Range;

use gridflux_core::address::{CellAddress, ColumnKey};
use gridflux_core::column::Column;
use gridflux_core::record::{ItemId, RowSet};
use gridflux_core::value::{FieldValue, ValueKey};

use crate::autofill::{DependencyEdge, DependencyResolver, ResolveOutcome, RowAutoFillState};
use crate::dragfill::{DragFill, DragPass};
use crate::error::{CommitError, EditError, ValidationError};
use crate::events::{
    CancelledEvent, CellEditedEvent, CommitFailedEvent, CommittedEvent,
    ConfirmationRequestedEvent, ConfirmationResolvedEvent, DragFillAppliedEvent, EventCallback,
    FilterChangedEvent, GridEvent,
};
use crate::filter::{
    ColumnFilter, DistinctValueEntry, FilterCondition, FilterSet, FilterView, DEFAULT_MAX_DISTINCT,
};
use crate::ledger::{ChangeLedger, CommitReceipt, CommitSink, PendingChange};
use crate::options::{LoadTicket, OptionLoader};
use crate::validate::{parse_input, validate_value};
use crate::window::{Align, WindowIndex, DEFAULT_REESTIMATE_TOLERANCE};

/// Construction tunables. `Default` matches the values a host gets
/// without any configuration.
#[derive(Debug, Clone)]
pub struct GridOptions {
    /// Fixed row height, or the initial estimate in variable mode.
    pub row_height: f32,
    /// Rows materialized beyond each viewport edge.
    pub overscan: usize,
    /// Variable mode tracks measured heights in a prefix-sum index.
    pub variable_heights: bool,
    /// Mean-drift threshold that re-estimates unmeasured rows.
    pub reestimate_tolerance: f32,
    /// Cap on distinct values enumerated per filter list.
    pub max_distinct: usize,
    /// Reject choice values missing from a loaded option list.
    pub strict_choice: bool,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            row_height: 24.0,
            overscan: 5,
            variable_heights: false,
            reestimate_tolerance: DEFAULT_REESTIMATE_TOLERANCE,
            max_distinct: DEFAULT_MAX_DISTINCT,
            strict_choice: false,
        }
    }
}

/// One editable grid: rows, column schema, and every per-grid subsystem.
pub struct Grid {
    rows: RowSet,
    columns: Vec<Column>,
    ledger: ChangeLedger,
    resolver: DependencyResolver,
    filters: FilterSet,
    view: FilterView,
    window: WindowIndex,
    drag: DragFill,
    options: OptionLoader,
    callback: Option<EventCallback>,
    strict_choice: bool,
    viewport_height: f32,
    scroll_offset: f32,
    /// Visible window positions as of the last `frame_tick`.
    visible: Range<usize>,
    /// The visibility view lags mutations until the next tick (or an
    /// eager rebuild on filter changes).
    view_dirty: bool,
}

impl Grid {
    // =========================================================================
    // Construction
    // =========================================================================

    pub fn new(rows: RowSet, columns: Vec<Column>) -> Self {
        Self::with_options(rows, columns, GridOptions::default())
    }

    pub fn with_options(rows: RowSet, columns: Vec<Column>, opts: GridOptions) -> Self {
        let row_count = rows.len();
        let window = if opts.variable_heights {
            WindowIndex::variable(row_count, opts.row_height, opts.overscan)
                .with_reestimate_tolerance(opts.reestimate_tolerance)
        } else {
            WindowIndex::fixed(row_count, opts.row_height, opts.overscan)
        };
        let mut filters = FilterSet::new();
        filters.set_max_distinct(opts.max_distinct);
        Self {
            rows,
            columns,
            ledger: ChangeLedger::new(),
            resolver: DependencyResolver::new(),
            filters,
            view: FilterView::new(row_count),
            window,
            drag: DragFill::new(),
            options: OptionLoader::new(),
            callback: None,
            strict_choice: opts.strict_choice,
            viewport_height: 0.0,
            scroll_offset: 0.0,
            visible: 0..0,
            view_dirty: false,
        }
    }

    /// Register one derivation rule. Definition order is evaluation order.
    pub fn add_dependency(&mut self, edge: DependencyEdge) {
        self.resolver.add_edge(edge);
    }

    /// Register the single event callback, replacing any previous one.
    pub fn set_event_callback(&mut self, callback: EventCallback) {
        self.callback = Some(callback);
    }

    /// Release host-facing resources: in-flight option loads are
    /// cancelled and the event callback is dropped.
    pub fn teardown(&mut self) {
        let cancelled = self.options.cancel_all();
        if cancelled > 0 {
            log::debug!("teardown cancelled {cancelled} in-flight option loads");
        }
        self.callback = None;
    }

    // =========================================================================
    // Rows & Columns
    // =========================================================================

    pub fn rows(&self) -> &RowSet {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, key: &ColumnKey) -> Option<&Column> {
        self.columns.iter().find(|c| c.key == *key)
    }

    /// Current (pending-aware) value of a cell. Missing rows read blank.
    pub fn value(&self, row: usize, column: &ColumnKey) -> FieldValue {
        self.rows.value(row, column)
    }

    /// Replace the column schema. Filters on columns that left the
    /// schema are dropped, every option load is cancelled, and cached
    /// distinct lists are invalidated.
    pub fn set_columns(&mut self, columns: Vec<Column>) {
        let cancelled = self.options.cancel_all();
        if cancelled > 0 {
            log::debug!("column reconfiguration cancelled {cancelled} option loads");
        }
        let stale: Vec<ColumnKey> = self
            .filters
            .active_columns()
            .filter(|key| !columns.iter().any(|c| c.key == **key))
            .cloned()
            .collect();
        for key in &stale {
            self.filters.clear_filter(key);
        }
        self.columns = columns;
        self.filters.invalidate_all();
        if !stale.is_empty() {
            let visible = self.rebuild_view();
            self.emit(GridEvent::FilterChanged(FilterChangedEvent {
                column: None,
                visible,
            }));
        }
    }

    /// Remove a row from the grid, reconciling every subsystem: ledger
    /// entries shift or drop, the row's confirmation state is discarded,
    /// an active drag adjusts its range, caches invalidate. Returns
    /// false when the row does not exist.
    pub fn remove_row(&mut self, row: usize) -> bool {
        let Some(item_id) = self.rows.item_id(row) else {
            return false;
        };
        self.rows.remove(row);
        let dropped = self.ledger.reconcile_removed_row(row);
        if !dropped.is_empty() {
            log::debug!("row removal dropped {} pending changes", dropped.len());
        }
        self.resolver.clear_row(item_id);
        self.drag.reconcile_removed_row(row);
        self.filters.invalidate_all();
        self.view.remove_row(row);
        self.window.set_row_count(self.view.visible_count());
        true
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Apply a single-cell edit. The value is validated against the
    /// column, written through the ledger, and fed to the dependency
    /// resolver. Returns Ok(false) when the value matched the current
    /// one and nothing changed.
    ///
    /// An edit during an active drag ends the drag first.
    pub fn edit_cell(
        &mut self,
        row: usize,
        column: &ColumnKey,
        value: FieldValue,
    ) -> Result<bool, EditError> {
        let meta = self
            .column(column)
            .ok_or_else(|| ValidationError::UnknownColumn(column.as_str().to_string()))?;
        validate_value(&value, meta, self.options.options(column), self.strict_choice)?;
        self.drag_barrier("cell edit");

        let addr = CellAddress {
            row,
            column: column.clone(),
        };
        let changed = self.ledger.record_edit(&mut self.rows, addr.clone(), value)?;
        if !changed {
            return Ok(false);
        }

        self.filters.invalidate_column(column);
        self.view_dirty = true;
        let pending_count = self.ledger.len();
        self.emit(GridEvent::CellEdited(CellEditedEvent {
            address: addr,
            pending_count,
        }));
        self.resolve_after_change(row, column);
        Ok(true)
    }

    /// Parse editor text for the column's data type, then apply it as an
    /// edit. Blank input clears the cell.
    pub fn edit_cell_text(
        &mut self,
        row: usize,
        column: &ColumnKey,
        input: &str,
    ) -> Result<bool, EditError> {
        let meta = self
            .column(column)
            .ok_or_else(|| ValidationError::UnknownColumn(column.as_str().to_string()))?;
        let value = parse_input(input, meta)?;
        self.edit_cell(row, column, value)
    }

    pub fn pending_count(&self) -> usize {
        self.ledger.len()
    }

    pub fn has_pending_edits(&self) -> bool {
        !self.ledger.is_empty()
    }

    pub fn pending_change(&self, addr: &CellAddress) -> Option<&PendingChange> {
        self.ledger.get(addr)
    }

    /// Pending changes in commit order (row-major by address).
    pub fn pending_changes(&self) -> impl Iterator<Item = &PendingChange> {
        self.ledger.changes()
    }

    // =========================================================================
    // Drag Fill
    // =========================================================================

    /// Start a fill-handle drag from `(row, column)`. Returns false when
    /// the cell does not exist or a drag is already active.
    pub fn begin_drag_fill(&mut self, row: usize, column: &ColumnKey) -> bool {
        if self.drag.is_active() || self.column(column).is_none() {
            return false;
        }
        self.drag.begin(&self.rows, row, column.clone())
    }

    /// Move the drag target. Cheap: marks state for the next
    /// `frame_tick`, no ledger writes here.
    pub fn drag_fill_to(&mut self, target_row: usize) -> bool {
        self.drag.update(target_row)
    }

    /// End the drag: the final range is applied in one batched pass,
    /// then the resolver reacts to every filled row. Gated derivations
    /// surface as ConfirmationRequested events after the single
    /// DragFillApplied notification.
    pub fn end_drag_fill(&mut self) -> Option<DragPass> {
        let pass = self.drag.finish(&mut self.rows, &mut self.ledger)?;
        self.filters.invalidate_column(&pass.column);
        self.view_dirty = true;

        let mut deferred: Vec<(ItemId, usize, Vec<ColumnKey>)> = Vec::new();
        for row in pass.range.rows() {
            match self
                .resolver
                .on_cell_changed(&mut self.rows, &mut self.ledger, row, &pass.column)
            {
                ResolveOutcome::Applied(targets) => {
                    for target in &targets {
                        self.filters.invalidate_column(target);
                    }
                }
                ResolveOutcome::Deferred(targets) => {
                    if let Some(item_id) = self.rows.item_id(row) {
                        deferred.push((item_id, row, targets));
                    }
                }
                ResolveOutcome::NoChange => {}
            }
        }

        self.emit(GridEvent::DragFillApplied(DragFillAppliedEvent {
            column: pass.column.clone(),
            range: pass.range,
            cells_changed: pass.cells_changed,
            finished: true,
        }));
        for (item_id, row, deferred_targets) in deferred {
            self.emit(GridEvent::ConfirmationRequested(ConfirmationRequestedEvent {
                item_id,
                row,
                deferred_targets,
            }));
        }
        Some(pass)
    }

    pub fn is_drag_active(&self) -> bool {
        self.drag.is_active()
    }

    /// Per-frame pump. Applies coalesced drag movement, refreshes the
    /// visibility view if stale, and recomputes the visible window from
    /// the current scroll state. Returns the visible position range.
    pub fn frame_tick(&mut self) -> Range<usize> {
        if let Some(pass) = self.drag.flush(&mut self.rows, &mut self.ledger) {
            self.filters.invalidate_column(&pass.column);
            self.view_dirty = true;
            self.emit(GridEvent::DragFillApplied(DragFillAppliedEvent {
                column: pass.column,
                range: pass.range,
                cells_changed: pass.cells_changed,
                finished: false,
            }));
        }
        self.refresh_view();
        self.visible = self
            .window
            .visible_range(self.viewport_height, self.scroll_offset);
        self.visible.clone()
    }

    // =========================================================================
    // Commit & Cancel
    // =========================================================================

    /// Flush all pending changes to the sink in one atomic batch. On
    /// success the ledger is cleared; on failure every entry is retained
    /// for retry and the error is surfaced. An active drag ends first so
    /// its cells are part of the batch.
    pub fn commit(&mut self, sink: &mut dyn CommitSink) -> Result<CommitReceipt, CommitError> {
        self.drag_barrier("commit");
        let changes = self.ledger.len();
        match self.ledger.commit(sink) {
            Ok(receipt) => {
                if changes > 0 {
                    let row_failures = receipt.row_failures.len();
                    self.emit(GridEvent::Committed(CommittedEvent {
                        changes,
                        row_failures,
                    }));
                }
                Ok(receipt)
            }
            Err(err) => {
                let retained = self.ledger.len();
                log::warn!("commit failed, {retained} changes retained: {err}");
                self.emit(GridEvent::CommitFailed(CommitFailedEvent {
                    message: err.to_string(),
                    retained,
                }));
                Err(err)
            }
        }
    }

    /// Revert every pending change to its session-old value and discard
    /// all deferred confirmations. Returns the number of reverted cells.
    pub fn cancel(&mut self) -> usize {
        self.drag_barrier("cancel");
        let reverted = self.ledger.cancel(&mut self.rows);
        self.resolver.clear_all_states();
        if reverted > 0 {
            self.filters.invalidate_all();
            self.view_dirty = true;
        }
        self.emit(GridEvent::Cancelled(CancelledEvent { reverted }));
        reverted
    }

    // =========================================================================
    // Auto-fill Confirmation
    // =========================================================================

    /// Confirm a row's deferred auto-fill batch: derivations re-run
    /// against current values and apply through the ledger. Returns the
    /// target columns actually written.
    pub fn confirm(&mut self, item_id: ItemId) -> Vec<ColumnKey> {
        let applied = self
            .resolver
            .confirm(&mut self.rows, &mut self.ledger, item_id);
        for target in &applied {
            self.filters.invalidate_column(target);
        }
        if !applied.is_empty() {
            self.view_dirty = true;
        }
        let count = applied.len();
        self.emit(GridEvent::ConfirmationResolved(ConfirmationResolvedEvent {
            item_id,
            applied: count,
        }));
        applied
    }

    pub fn row_auto_fill_state(&self, item_id: ItemId) -> RowAutoFillState {
        self.resolver.row_state(item_id)
    }

    /// Rows waiting on confirmation, in item id order.
    pub fn pending_confirmations(&self) -> Vec<ItemId> {
        self.resolver.pending_rows()
    }

    // =========================================================================
    // Filtering
    // =========================================================================

    /// Distinct values for a column's filter list, computed over rows
    /// passing every OTHER active filter. Served from cache until an
    /// edit or filter change invalidates the column.
    pub fn distinct_values(&mut self, column: &ColumnKey) -> Vec<DistinctValueEntry> {
        self.filters.distinct_values(column, &self.rows)
    }

    /// Keep only rows whose value in `column` groups under one of
    /// `keys`. An empty selection hides every row.
    pub fn set_value_filter(
        &mut self,
        column: &ColumnKey,
        keys: impl IntoIterator<Item = ValueKey>,
    ) {
        self.filters
            .set_filter(column.clone(), ColumnFilter::selecting(keys));
        let visible = self.rebuild_view();
        self.emit(GridEvent::FilterChanged(FilterChangedEvent {
            column: Some(column.clone()),
            visible,
        }));
    }

    /// Keep only blank rows (`keep_blanks`) or only non-blank rows.
    pub fn set_blank_filter(&mut self, column: &ColumnKey, keep_blanks: bool) {
        let condition = if keep_blanks {
            FilterCondition::is_empty()
        } else {
            FilterCondition::is_not_empty()
        };
        self.filters
            .set_filter(column.clone(), ColumnFilter::with_condition(condition));
        let visible = self.rebuild_view();
        self.emit(GridEvent::FilterChanged(FilterChangedEvent {
            column: Some(column.clone()),
            visible,
        }));
    }

    /// Drop one column's filter. Returns false when none was active.
    pub fn clear_column_filter(&mut self, column: &ColumnKey) -> bool {
        if !self.filters.clear_filter(column) {
            return false;
        }
        let visible = self.rebuild_view();
        self.emit(GridEvent::FilterChanged(FilterChangedEvent {
            column: Some(column.clone()),
            visible,
        }));
        true
    }

    pub fn clear_all_filters(&mut self) {
        self.filters.clear_all();
        let visible = self.rebuild_view();
        self.emit(GridEvent::FilterChanged(FilterChangedEvent {
            column: None,
            visible,
        }));
    }

    pub fn has_active_filter(&self) -> bool {
        self.filters.has_active_filter()
    }

    /// Data rows currently visible, in display order. Reflects the last
    /// rebuild; call after `frame_tick` for a post-mutation view.
    pub fn visible_data_rows(&self) -> &[usize] {
        self.view.visible_rows()
    }

    pub fn visible_count(&self) -> usize {
        self.view.visible_count()
    }

    // =========================================================================
    // Windowing & Scroll
    // =========================================================================

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(0.0);
    }

    /// Update the scroll offset. The visible window is recomputed on the
    /// next `frame_tick`, not here, so a burst of scroll events costs
    /// one recompute per frame.
    pub fn set_scroll(&mut self, offset: f32) {
        self.scroll_offset = offset.max(0.0);
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    /// Height of the full visible row set, for sizing the scroll track.
    pub fn total_height(&self) -> f32 {
        self.window.total_height()
    }

    /// Report a materialized row's actual pixel height (variable mode).
    /// `position` indexes the visible sequence, matching `frame_tick`.
    pub fn measure_row(&mut self, position: usize, height: f32) -> bool {
        self.window.measure(position, height)
    }

    /// Data rows to materialize for the current window, in display
    /// order, as of the last `frame_tick`.
    pub fn viewport_rows(&self) -> Vec<usize> {
        self.visible
            .clone()
            .filter_map(|pos| self.view.nth_visible(pos))
            .collect()
    }

    /// Scroll so `data_row` lands at the given viewport alignment.
    /// Returns the new offset, or None when the row is filtered out or
    /// out of range. Takes effect immediately.
    pub fn scroll_to_row(&mut self, data_row: usize, align: Align) -> Option<f32> {
        self.refresh_view();
        let position = self.view.visible_index_of(data_row)?;
        let offset = self
            .window
            .scroll_to(position, align, self.viewport_height)?;
        self.scroll_offset = offset;
        self.visible = self
            .window
            .visible_range(self.viewport_height, self.scroll_offset);
        Some(offset)
    }

    // =========================================================================
    // Option Loading
    // =========================================================================

    /// Start an async option-list load for a choice column. A newer load
    /// for the same column supersedes this one.
    pub fn begin_options_load(&mut self, column: &ColumnKey) -> LoadTicket {
        self.options.begin_load(column.clone())
    }

    /// Deliver a completed load. Stale tickets are dropped and return
    /// false.
    pub fn complete_options_load(&mut self, ticket: &LoadTicket, items: Vec<String>) -> bool {
        self.options.complete(ticket, items)
    }

    /// Install an option list synchronously (host already has it).
    pub fn set_options(&mut self, column: &ColumnKey, items: Vec<String>) {
        self.options.set_options(column.clone(), items);
    }

    pub fn column_options(&self, column: &ColumnKey) -> Option<&[String]> {
        self.options.options(column)
    }

    pub fn is_loading_options(&self, column: &ColumnKey) -> bool {
        self.options.is_loading(column)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Mutations that reshape the target range cannot overlap a drag,
    /// so edits, commits, and cancels end any active drag first.
    fn drag_barrier(&mut self, reason: &str) {
        if self.drag.is_active() {
            log::debug!("{reason} ended active drag fill");
            self.end_drag_fill();
        }
    }

    fn resolve_after_change(&mut self, row: usize, trigger: &ColumnKey) {
        match self
            .resolver
            .on_cell_changed(&mut self.rows, &mut self.ledger, row, trigger)
        {
            ResolveOutcome::Applied(targets) => {
                for target in &targets {
                    self.filters.invalidate_column(target);
                }
            }
            ResolveOutcome::Deferred(deferred_targets) => {
                if let Some(item_id) = self.rows.item_id(row) {
                    self.emit(GridEvent::ConfirmationRequested(ConfirmationRequestedEvent {
                        item_id,
                        row,
                        deferred_targets,
                    }));
                }
            }
            ResolveOutcome::NoChange => {}
        }
    }

    /// Rebuild the visibility view now and sync the window's row count.
    /// Returns the visible row count.
    fn rebuild_view(&mut self) -> usize {
        self.view_dirty = false;
        let mask = self.filters.visible_mask(&self.rows);
        self.view.apply(mask);
        let visible = self.view.visible_count();
        self.window.set_row_count(visible);
        visible
    }

    fn refresh_view(&mut self) {
        if self.view_dirty {
            self.rebuild_view();
        }
    }

    fn emit(&mut self, event: GridEvent) {
        if let Some(callback) = self.callback.as_mut() {
            callback(event);
        }
    }
}
