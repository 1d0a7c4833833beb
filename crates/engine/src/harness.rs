//! Test harness for grid operations with event tracking.
//!
//! This module provides `GridHarness`, a wrapper around `Grid` that:
//! - Wires an `EventCollector` into the grid's event callback
//! - Builds a canned task-tracker dataset with every data type
//! - Provides shorthand for text-input edits and dependency edges
//!
//! Use this harness to test grid invariants without host dependencies.

use std::cell::RefCell;
use std::rc::Rc;

use gridflux_core::column::{Column, DataType};
use gridflux_core::record::{ItemId, MapRecord, RowSet};
use gridflux_core::value::FieldValue;

use chrono::NaiveDate;

use crate::autofill::DependencyEdge;
use crate::error::{CommitError, DeriveError, EditError};
use crate::events::EventCollector;
use crate::grid::{Grid, GridOptions};
use crate::ledger::{CommitReceipt, CommitSink, PendingChange};

pub fn text(s: &str) -> FieldValue {
    FieldValue::Text(s.to_string())
}

pub fn num(n: f64) -> FieldValue {
    FieldValue::Number(n)
}

pub fn date(y: i32, m: u32, d: u32) -> FieldValue {
    FieldValue::Date(
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
    )
}

/// Column schema for the canned task dataset.
pub fn task_columns() -> Vec<Column> {
    vec![
        Column::new("title", "Title", DataType::Text),
        Column::new("status", "Status", DataType::Choice),
        Column::new("owner", "Owner", DataType::Text),
        Column::new("points", "Points", DataType::Number),
        Column::new("due", "Due", DataType::Date),
        Column::new("size", "Size", DataType::Text),
        Column::new("done", "Done", DataType::Bool),
    ]
}

/// Six task rows with blanks spread across owner, due, size, and status.
pub fn task_rows() -> RowSet {
    let specs: Vec<(ItemId, &str, &str, &str, f64, Option<(i32, u32, u32)>, bool)> = vec![
        (101, "Fix login", "Open", "ana", 3.0, Some((2024, 3, 1)), false),
        (102, "Write docs", "Open", "ben", 1.0, None, false),
        (103, "Ship v2", "Blocked", "", 8.0, Some((2024, 4, 15)), false),
        (104, "Refactor io", "Open", "ana", 5.0, None, false),
        (105, "Retro notes", "Done", "cara", 1.0, Some((2024, 2, 10)), true),
        (106, "Plan q3", "", "ben", 2.0, None, false),
    ];

    let mut rows = RowSet::new();
    for (id, title, status, owner, points, due, done) in specs {
        let mut record = MapRecord::new(id)
            .with_field("title", text(title))
            .with_field("points", num(points))
            .with_field("done", FieldValue::Bool(done));
        if !status.is_empty() {
            record = record.with_field("status", text(status));
        }
        if !owner.is_empty() {
            record = record.with_field("owner", text(owner));
        }
        if let Some((y, m, d)) = due {
            record = record.with_field("due", date(y, m, d));
        }
        rows.push(Box::new(record));
    }
    rows
}

/// Edge deriving `done` from `status`: "Done" marks the row done, any
/// other status marks it not done. Blank status leaves the row alone.
pub fn status_edge(gated: bool) -> DependencyEdge {
    let edge = DependencyEdge::new("status", "done", |ctx| match ctx.value(ctx.trigger()) {
        FieldValue::Text(s) => Ok(Some(FieldValue::Bool(s == "Done"))),
        _ => Ok(None),
    });
    if gated {
        edge.with_confirmation()
    } else {
        edge
    }
}

/// Edge deriving a `size` bucket from `points`. Negative points are a
/// derive error, exercising the skip-and-log path.
pub fn points_edge() -> DependencyEdge {
    DependencyEdge::new("points", "size", |ctx| match ctx.value(ctx.trigger()) {
        FieldValue::Number(n) if n < 0.0 => Err(DeriveError::new("points cannot be negative")),
        FieldValue::Number(n) if n >= 5.0 => Ok(Some(text("large"))),
        FieldValue::Number(_) => Ok(Some(text("small"))),
        _ => Ok(None),
    })
}

/// Commit sink that records every accepted batch. Set `fail_next` to
/// reject the next batch once, leaving the ledger retained.
pub struct RecordingSink {
    pub batches: Vec<Vec<PendingChange>>,
    pub fail_next: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            batches: Vec::new(),
            fail_next: false,
        }
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitSink for RecordingSink {
    fn apply(&mut self, changes: &[PendingChange]) -> Result<CommitReceipt, CommitError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(CommitError::Sink("sink rejected batch".to_string()));
        }
        self.batches.push(changes.to_vec());
        Ok(CommitReceipt::default())
    }
}

/// Test harness wrapping Grid with event collection.
pub struct GridHarness {
    pub grid: Grid,
    events: Rc<RefCell<EventCollector>>,
}

impl GridHarness {
    /// Harness over the canned task dataset with default options.
    pub fn new() -> Self {
        Self::with_options(GridOptions::default())
    }

    /// Canned task dataset with strict choice validation.
    pub fn strict() -> Self {
        Self::with_options(GridOptions {
            strict_choice: true,
            ..GridOptions::default()
        })
    }

    /// Canned task dataset with custom options.
    pub fn with_options(opts: GridOptions) -> Self {
        Self::with_grid(Grid::with_options(task_rows(), task_columns(), opts))
    }

    /// Wrap an existing grid, wiring the event collector.
    pub fn with_grid(mut grid: Grid) -> Self {
        let events = Rc::new(RefCell::new(EventCollector::new()));
        let sink = Rc::clone(&events);
        grid.set_event_callback(Box::new(move |event| {
            sink.borrow_mut().push(event);
        }));
        Self { grid, events }
    }

    /// Get collected events.
    pub fn events(&self) -> std::cell::Ref<'_, EventCollector> {
        self.events.borrow()
    }

    /// Clear collected events.
    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    /// Edit through the text-input path, panicking on validation errors.
    /// Returns whether the live value changed.
    pub fn edit(&mut self, row: usize, column: &str, input: &str) -> bool {
        match self.grid.edit_cell_text(row, &column.into(), input) {
            Ok(changed) => changed,
            Err(EditError::Validation(e)) => panic!("edit ({row}, {column}) rejected: {e}"),
            Err(EditError::Ledger(e)) => panic!("edit ({row}, {column}) failed: {e}"),
        }
    }
}

impl Default for GridHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::GridEvent;
    use gridflux_core::address::CellAddress;

    #[test]
    fn test_harness_collects_events() {
        let mut harness = GridHarness::new();

        harness.edit(0, "owner", "dana");
        harness.edit(1, "points", "4");

        let events = harness.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events.events()[0], GridEvent::CellEdited(_)));
        drop(events);

        harness.clear_events();
        assert!(harness.events().is_empty());
    }

    #[test]
    fn test_canned_dataset_shape() {
        let rows = task_rows();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows.item_id(0), Some(101));
        assert!(rows.value(2, &"owner".into()).is_blank());
        assert!(rows.value(5, &"status".into()).is_blank());
        assert_eq!(rows.value(4, &"done".into()), FieldValue::Bool(true));
        assert_eq!(task_columns().len(), 7);
    }

    #[test]
    fn test_recording_sink_fails_once() {
        let mut harness = GridHarness::new();
        let mut sink = RecordingSink::new();
        sink.fail_next = true;

        harness.edit(0, "owner", "dana");
        assert!(harness.grid.commit(&mut sink).is_err());
        assert!(harness.grid.commit(&mut sink).is_ok());
        assert_eq!(sink.batches.len(), 1);
        assert_eq!(
            sink.batches[0][0].address(),
            CellAddress::new(0, "owner")
        );
    }
}
