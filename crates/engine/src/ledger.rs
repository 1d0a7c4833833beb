//! Pending-change ledger: per-cell edits staged until commit or cancel.
//!
//! Invariants:
//! - One entry per cell address. `old_value` is fixed when the entry is
//!   created and never rewritten by later edits to the same cell, so it
//!   always holds the value from before the current uncommitted session.
//! - Every recorded edit writes through to the live row immediately;
//!   the ledger remembers how to undo, not how to apply.
//! - An entry whose `new_value` returns to `old_value` is dropped. The
//!   ledger never holds no-op changes.
//! - Commit offers entries to the sink in row-then-column order. A sink
//!   failure leaves every entry in place so the commit can be retried.

use std::collections::BTreeMap;

use gridflux_core::address::{CellAddress, ColumnKey, RowRange};
use gridflux_core::record::{ItemId, RowSet};
use gridflux_core::value::FieldValue;
use serde::{Deserialize, Serialize};

use crate::error::{CommitError, LedgerError};

/// One staged cell change, as offered to the commit sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    pub item_id: ItemId,
    pub row_index: usize,
    pub column_key: ColumnKey,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
}

impl PendingChange {
    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row_index, self.column_key.clone())
    }
}

/// Host persistence boundary for committed changes.
pub trait CommitSink {
    /// Apply a batch of changes. `Err` rejects the whole batch (the
    /// ledger keeps it for retry); row-level failures on an accepted
    /// batch are reported through the receipt instead.
    fn apply(&mut self, changes: &[PendingChange]) -> Result<CommitReceipt, CommitError>;
}

/// Outcome of an accepted commit batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReceipt {
    /// Rows the host failed to patch after accepting the batch. These
    /// do not restore the ledger; recovery is the host's concern.
    pub row_failures: Vec<RowFailure>,
}

impl CommitReceipt {
    pub fn is_clean(&self) -> bool {
        self.row_failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub item_id: ItemId,
    pub message: String,
}

/// Per-cell pending edits, keyed by address in stable commit order.
#[derive(Debug, Default)]
pub struct ChangeLedger {
    entries: BTreeMap<CellAddress, PendingChange>,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, addr: &CellAddress) -> Option<&PendingChange> {
        self.entries.get(addr)
    }

    /// True when the cell has an uncommitted change (UI dirty marker).
    pub fn contains(&self, addr: &CellAddress) -> bool {
        self.entries.contains_key(addr)
    }

    /// Pending changes in stable commit order.
    pub fn changes(&self) -> impl Iterator<Item = &PendingChange> {
        self.entries.values()
    }

    /// Record one edit and write it through to the live row.
    ///
    /// First edit to a cell captures the live value as `old_value`;
    /// later edits only move `new_value`. Editing back to `old_value`
    /// drops the entry. Returns whether the live value changed.
    pub fn record_edit(
        &mut self,
        rows: &mut RowSet,
        addr: CellAddress,
        new_value: FieldValue,
    ) -> Result<bool, LedgerError> {
        let Some(item_id) = rows.item_id(addr.row) else {
            return Err(LedgerError::RowMissing(addr.row));
        };
        let live = rows.value(addr.row, &addr.column);
        if new_value == live {
            return Ok(false);
        }

        let old_value = match self.entries.get(&addr) {
            Some(entry) => entry.old_value.clone(),
            None => live,
        };
        rows.set_value(addr.row, &addr.column, new_value.clone());

        if new_value == old_value {
            self.entries.remove(&addr);
        } else {
            let entry = PendingChange {
                item_id,
                row_index: addr.row,
                column_key: addr.column.clone(),
                old_value,
                new_value,
            };
            self.entries.insert(addr, entry);
        }
        Ok(true)
    }

    /// Apply one drag-fill pass: write `value` into `column` across
    /// `range`.
    ///
    /// A cell without a ledger entry is still at its pre-session value,
    /// so that live value becomes `old_value` when an entry is created;
    /// cells already tracked keep theirs. Every row therefore holds its
    /// own pre-session value, never the drag source's. Rows deleted
    /// mid-drag are skipped. Returns addresses whose live value changed.
    pub fn record_drag_fill(
        &mut self,
        rows: &mut RowSet,
        range: RowRange,
        column: &ColumnKey,
        value: &FieldValue,
    ) -> Vec<CellAddress> {
        let mut touched = Vec::new();
        for row in range.rows() {
            let Some(item_id) = rows.item_id(row) else {
                continue;
            };
            let addr = CellAddress::new(row, column.clone());
            let live = rows.value(row, column);

            let old_value = match self.entries.get(&addr) {
                Some(entry) => entry.old_value.clone(),
                None => live.clone(),
            };
            if live != *value {
                rows.set_value(row, column, value.clone());
                touched.push(addr.clone());
            }
            if old_value == *value {
                self.entries.remove(&addr);
            } else {
                self.entries
                    .entry(addr)
                    .and_modify(|entry| entry.new_value = value.clone())
                    .or_insert_with(|| PendingChange {
                        item_id,
                        row_index: row,
                        column_key: column.clone(),
                        old_value,
                        new_value: value.clone(),
                    });
            }
        }
        touched
    }

    /// Flush every pending change to the sink in stable order.
    ///
    /// On sink failure the ledger is untouched and the commit can be
    /// retried. On success the ledger clears; per-row failures in the
    /// receipt do not restore entries.
    pub fn commit(&mut self, sink: &mut dyn CommitSink) -> Result<CommitReceipt, CommitError> {
        if self.entries.is_empty() {
            return Ok(CommitReceipt::default());
        }
        let batch: Vec<PendingChange> = self.entries.values().cloned().collect();
        let receipt = sink.apply(&batch)?;
        self.entries.clear();
        Ok(receipt)
    }

    /// Write every entry's `old_value` back to its live row, skipping
    /// rows that no longer exist, then clear the ledger. Returns the
    /// number of cells reverted.
    pub fn cancel(&mut self, rows: &mut RowSet) -> usize {
        let mut reverted = 0;
        for (addr, entry) in std::mem::take(&mut self.entries) {
            if rows.set_value(addr.row, &addr.column, entry.old_value) {
                reverted += 1;
            }
        }
        reverted
    }

    /// Reconcile addresses after the host removed a row: entries on the
    /// removed row are dropped (and returned), entries below it shift up
    /// one slot.
    pub fn reconcile_removed_row(&mut self, row: usize) -> Vec<PendingChange> {
        let mut dropped = Vec::new();
        let mut kept = BTreeMap::new();
        for (addr, mut entry) in std::mem::take(&mut self.entries) {
            if addr.row == row {
                dropped.push(entry);
            } else if addr.row > row {
                entry.row_index = addr.row - 1;
                kept.insert(CellAddress::new(addr.row - 1, addr.column), entry);
            } else {
                kept.insert(addr, entry);
            }
        }
        self.entries = kept;
        dropped
    }
}
