//! Async choice-option loading with last-request-wins tickets.
//!
//! The engine is single threaded: the host starts a load, fetches the
//! list however it likes, and hands the result back with the ticket it
//! was given. A ticket is current only until the next `begin_load` (or
//! cancel) for the same column, so completions from superseded requests
//! drop out instead of clobbering newer data.

use gridflux_core::address::ColumnKey;
use rustc_hash::{FxHashMap, FxHashSet};

/// Claim on one in-flight option load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    column: ColumnKey,
    generation: u64,
}

impl LoadTicket {
    pub fn column(&self) -> &ColumnKey {
        &self.column
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Choice-option lists per column, plus in-flight load bookkeeping.
#[derive(Debug, Default)]
pub struct OptionLoader {
    /// Latest generation issued per column. Older tickets are stale.
    generations: FxHashMap<ColumnKey, u64>,
    options: FxHashMap<ColumnKey, Vec<String>>,
    loading: FxHashSet<ColumnKey>,
}

impl OptionLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) a load for a column. Any ticket issued earlier
    /// for the same column becomes stale.
    pub fn begin_load(&mut self, column: ColumnKey) -> LoadTicket {
        let generation = self.generations.entry(column.clone()).or_insert(0);
        *generation += 1;
        self.loading.insert(column.clone());
        LoadTicket {
            column,
            generation: *generation,
        }
    }

    /// Store a completed load. Returns false (dropping the items) when
    /// the ticket has been superseded or cancelled.
    pub fn complete(&mut self, ticket: &LoadTicket, items: Vec<String>) -> bool {
        if self.generations.get(&ticket.column) != Some(&ticket.generation)
            || !self.loading.contains(&ticket.column)
        {
            log::debug!(
                "dropping stale option load for column {} (generation {})",
                ticket.column,
                ticket.generation
            );
            return false;
        }
        self.loading.remove(&ticket.column);
        self.options.insert(ticket.column.clone(), items);
        true
    }

    /// Cancel the outstanding load for a column, if any. The loaded
    /// options it would have replaced stay available.
    pub fn cancel_column(&mut self, column: &ColumnKey) -> bool {
        if !self.loading.remove(column) {
            return false;
        }
        // Bump so the in-flight completion reads as stale.
        *self.generations.entry(column.clone()).or_insert(0) += 1;
        true
    }

    /// Cancel every outstanding load (reconfiguration, teardown).
    pub fn cancel_all(&mut self) -> usize {
        let columns: Vec<ColumnKey> = self.loading.iter().cloned().collect();
        for column in &columns {
            *self.generations.entry(column.clone()).or_insert(0) += 1;
        }
        self.loading.clear();
        columns.len()
    }

    /// Seed options synchronously, bypassing the ticket protocol.
    pub fn set_options(&mut self, column: ColumnKey, items: Vec<String>) {
        self.cancel_column(&column);
        self.options.insert(column, items);
    }

    pub fn options(&self, column: &ColumnKey) -> Option<&[String]> {
        self.options.get(column).map(|v| v.as_slice())
    }

    pub fn is_loading(&self, column: &ColumnKey) -> bool {
        self.loading.contains(column)
    }

    pub fn loading_count(&self) -> usize {
        self.loading.len()
    }
}
