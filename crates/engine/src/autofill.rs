//! Dependent-column auto-fill.
//!
//! A `DependencyEdge` derives a target column's value from a source
//! column. When a trigger cell changes, every edge off that column runs
//! against the row; derivations that would change the live target value
//! form the candidate batch. If any candidate's edge requires
//! confirmation the whole batch is deferred and the row waits in
//! `PendingConfirmation` until confirmed. Otherwise the batch applies
//! immediately through the change ledger. A derivation failure skips
//! that edge only, never its siblings.

use gridflux_core::address::{CellAddress, ColumnKey};
use gridflux_core::record::{ItemId, Record, RowSet};
use gridflux_core::value::FieldValue;
use rustc_hash::FxHashMap;

use crate::error::DeriveError;
use crate::ledger::ChangeLedger;

/// Row values as a derivation sees them: the in-flight trigger value
/// wins over the stored one.
pub struct DeriveContext<'a> {
    record: &'a dyn Record,
    trigger: &'a ColumnKey,
    trigger_value: &'a FieldValue,
}

impl<'a> DeriveContext<'a> {
    pub fn new(record: &'a dyn Record, trigger: &'a ColumnKey, trigger_value: &'a FieldValue) -> Self {
        Self {
            record,
            trigger,
            trigger_value,
        }
    }

    pub fn value(&self, column: &ColumnKey) -> FieldValue {
        if column == self.trigger {
            self.trigger_value.clone()
        } else {
            self.record.get_field(column)
        }
    }

    pub fn trigger(&self) -> &ColumnKey {
        self.trigger
    }

    pub fn item_id(&self) -> ItemId {
        self.record.item_id()
    }
}

pub type DeriveFn = Box<dyn Fn(&DeriveContext) -> Result<Option<FieldValue>, DeriveError>>;

/// One directed derivation: when `source` changes, compute a value for
/// `target`. `Ok(None)` means the rule does not apply to this row.
pub struct DependencyEdge {
    pub source: ColumnKey,
    pub target: ColumnKey,
    derive: DeriveFn,
    /// Gated edges never apply silently: a differing result defers the
    /// whole candidate batch until the row is confirmed.
    pub requires_confirmation: bool,
}

impl DependencyEdge {
    pub fn new(
        source: impl Into<ColumnKey>,
        target: impl Into<ColumnKey>,
        derive: impl Fn(&DeriveContext) -> Result<Option<FieldValue>, DeriveError> + 'static,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            derive: Box::new(derive),
            requires_confirmation: false,
        }
    }

    pub fn with_confirmation(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    pub fn derive(&self, ctx: &DeriveContext) -> Result<Option<FieldValue>, DeriveError> {
        (self.derive)(ctx)
    }
}

impl std::fmt::Debug for DependencyEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyEdge")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("requires_confirmation", &self.requires_confirmation)
            .finish()
    }
}

/// Auto-fill state of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowAutoFillState {
    #[default]
    Clean,
    /// A gated batch is waiting on user confirmation.
    PendingConfirmation,
}

/// What a trigger change resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// No applicable edges, or every derivation matched the live value.
    NoChange,
    /// Ungated candidates were written through the ledger.
    Applied(Vec<ColumnKey>),
    /// A gated candidate deferred the whole batch; nothing was written.
    Deferred(Vec<ColumnKey>),
}

/// Dependency graph plus per-row confirmation state.
#[derive(Debug, Default)]
pub struct DependencyResolver {
    /// Definition order is evaluation order.
    edges: Vec<DependencyEdge>,
    row_states: FxHashMap<ItemId, RowAutoFillState>,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, edge: DependencyEdge) {
        self.edges.push(edge);
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn row_state(&self, item_id: ItemId) -> RowAutoFillState {
        self.row_states.get(&item_id).copied().unwrap_or_default()
    }

    pub fn has_pending(&self) -> bool {
        !self.row_states.is_empty()
    }

    /// Rows waiting on confirmation, in item id order.
    pub fn pending_rows(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.row_states.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Drop a row's pending flag (cancel, or the row was removed). The
    /// deferred batch is discarded, never applied.
    pub fn clear_row(&mut self, item_id: ItemId) -> bool {
        self.row_states.remove(&item_id).is_some()
    }

    pub fn clear_all_states(&mut self) {
        self.row_states.clear();
    }

    /// React to a cell change already written to `rows`.
    ///
    /// Evaluates every edge off the trigger column, collects candidates
    /// whose derived value differs from the live target, then either
    /// applies the whole batch through the ledger or defers it when any
    /// candidate is gated.
    pub fn on_cell_changed(
        &mut self,
        rows: &mut RowSet,
        ledger: &mut ChangeLedger,
        row: usize,
        trigger: &ColumnKey,
    ) -> ResolveOutcome {
        let Some(item_id) = rows.item_id(row) else {
            return ResolveOutcome::NoChange;
        };

        let mut candidates: Vec<(ColumnKey, FieldValue, bool)> = Vec::new();
        {
            let Some(record) = rows.get(row) else {
                return ResolveOutcome::NoChange;
            };
            let trigger_value = record.get_field(trigger);
            let ctx = DeriveContext::new(record, trigger, &trigger_value);
            for edge in self.edges.iter().filter(|e| e.source == *trigger) {
                match edge.derive(&ctx) {
                    Ok(Some(value)) => {
                        if record.get_field(&edge.target) != value {
                            candidates.push((edge.target.clone(), value, edge.requires_confirmation));
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        log::warn!(
                            "auto-fill {} -> {} skipped: {}",
                            edge.source,
                            edge.target,
                            err
                        );
                    }
                }
            }
        }

        if candidates.is_empty() {
            return ResolveOutcome::NoChange;
        }
        if candidates.iter().any(|(_, _, gated)| *gated) {
            self.row_states
                .insert(item_id, RowAutoFillState::PendingConfirmation);
            let targets = candidates.into_iter().map(|(target, _, _)| target).collect();
            return ResolveOutcome::Deferred(targets);
        }

        let mut applied = Vec::new();
        for (target, value, _) in candidates {
            match ledger.record_edit(rows, CellAddress::new(row, target.clone()), value) {
                Ok(true) => applied.push(target),
                Ok(false) => {}
                Err(err) => log::warn!("auto-fill write to {} failed: {}", target, err),
            }
        }
        ResolveOutcome::Applied(applied)
    }

    /// Resolve a deferred batch: re-derive every edge for the row with
    /// its current values, apply the results (gated included), and
    /// return the targets written. Clears the pending flag even when the
    /// row no longer exists.
    pub fn confirm(
        &mut self,
        rows: &mut RowSet,
        ledger: &mut ChangeLedger,
        item_id: ItemId,
    ) -> Vec<ColumnKey> {
        self.row_states.remove(&item_id);
        let Some(row) = rows.row_of_item(item_id) else {
            return Vec::new();
        };

        let mut batch: Vec<(ColumnKey, FieldValue)> = Vec::new();
        {
            let Some(record) = rows.get(row) else {
                return Vec::new();
            };
            for edge in &self.edges {
                let source_value = record.get_field(&edge.source);
                let ctx = DeriveContext::new(record, &edge.source, &source_value);
                match edge.derive(&ctx) {
                    Ok(Some(value)) => {
                        if record.get_field(&edge.target) != value {
                            batch.push((edge.target.clone(), value));
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        log::warn!(
                            "auto-fill {} -> {} skipped: {}",
                            edge.source,
                            edge.target,
                            err
                        );
                    }
                }
            }
        }

        let mut applied = Vec::new();
        for (target, value) in batch {
            match ledger.record_edit(rows, CellAddress::new(row, target.clone()), value) {
                Ok(true) => applied.push(target),
                Ok(false) => {}
                Err(err) => log::warn!("auto-fill write to {} failed: {}", target, err),
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridflux_core::record::MapRecord;

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn make_rows() -> RowSet {
        let mut rows = RowSet::new();
        rows.push(Box::new(
            MapRecord::new(1)
                .with_field("country", text("de"))
                .with_field("currency", FieldValue::Empty)
                .with_field("tax", FieldValue::Empty),
        ));
        rows
    }

    fn currency_edge() -> DependencyEdge {
        DependencyEdge::new("country", "currency", |ctx| {
            Ok(match ctx.value(&"country".into()) {
                FieldValue::Text(c) if c == "de" => Some(text("EUR")),
                FieldValue::Text(c) if c == "us" => Some(text("USD")),
                _ => None,
            })
        })
    }

    fn tax_edge() -> DependencyEdge {
        DependencyEdge::new("country", "tax", |ctx| {
            Ok(match ctx.value(&"country".into()) {
                FieldValue::Text(c) if c == "de" => Some(FieldValue::Number(19.0)),
                FieldValue::Text(c) if c == "us" => Some(FieldValue::Number(8.0)),
                _ => None,
            })
        })
    }

    #[test]
    fn test_ungated_candidates_apply_through_ledger() {
        let mut rows = make_rows();
        let mut ledger = ChangeLedger::new();
        let mut resolver = DependencyResolver::new();
        resolver.add_edge(currency_edge());
        resolver.add_edge(tax_edge());

        let outcome = resolver.on_cell_changed(&mut rows, &mut ledger, 0, &"country".into());

        assert_eq!(
            outcome,
            ResolveOutcome::Applied(vec!["currency".into(), "tax".into()])
        );
        assert_eq!(rows.value(0, &"currency".into()), text("EUR"));
        assert_eq!(rows.value(0, &"tax".into()), FieldValue::Number(19.0));
        assert_eq!(ledger.len(), 2, "derived writes are pending changes");
        assert_eq!(resolver.row_state(1), RowAutoFillState::Clean);
    }

    #[test]
    fn test_resolution_is_idempotent_against_live_values() {
        let mut rows = make_rows();
        let mut ledger = ChangeLedger::new();
        let mut resolver = DependencyResolver::new();
        resolver.add_edge(currency_edge());

        resolver.on_cell_changed(&mut rows, &mut ledger, 0, &"country".into());
        let second = resolver.on_cell_changed(&mut rows, &mut ledger, 0, &"country".into());

        assert_eq!(second, ResolveOutcome::NoChange, "derived value already live");
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_derive_none_means_rule_not_applicable() {
        let mut rows = make_rows();
        rows.set_value(0, &"country".into(), text("atlantis"));
        let mut ledger = ChangeLedger::new();
        let mut resolver = DependencyResolver::new();
        resolver.add_edge(currency_edge());

        let outcome = resolver.on_cell_changed(&mut rows, &mut ledger, 0, &"country".into());
        assert_eq!(outcome, ResolveOutcome::NoChange);
        assert_eq!(rows.value(0, &"currency".into()), FieldValue::Empty);
    }

    #[test]
    fn test_derive_error_skips_edge_not_siblings() {
        let mut rows = make_rows();
        let mut ledger = ChangeLedger::new();
        let mut resolver = DependencyResolver::new();
        resolver.add_edge(DependencyEdge::new("country", "currency", |_| {
            Err(DeriveError::new("lookup service unavailable"))
        }));
        resolver.add_edge(tax_edge());

        let outcome = resolver.on_cell_changed(&mut rows, &mut ledger, 0, &"country".into());

        assert_eq!(outcome, ResolveOutcome::Applied(vec!["tax".into()]));
        assert_eq!(rows.value(0, &"currency".into()), FieldValue::Empty);
        assert_eq!(rows.value(0, &"tax".into()), FieldValue::Number(19.0));
    }

    #[test]
    fn test_gated_candidate_defers_whole_batch() {
        let mut rows = make_rows();
        let mut ledger = ChangeLedger::new();
        let mut resolver = DependencyResolver::new();
        resolver.add_edge(currency_edge());
        resolver.add_edge(tax_edge().with_confirmation());

        let outcome = resolver.on_cell_changed(&mut rows, &mut ledger, 0, &"country".into());

        assert_eq!(
            outcome,
            ResolveOutcome::Deferred(vec!["currency".into(), "tax".into()])
        );
        // Nothing applied, not even the ungated sibling.
        assert_eq!(rows.value(0, &"currency".into()), FieldValue::Empty);
        assert_eq!(rows.value(0, &"tax".into()), FieldValue::Empty);
        assert!(ledger.is_empty());
        assert_eq!(resolver.row_state(1), RowAutoFillState::PendingConfirmation);
    }

    #[test]
    fn test_gated_edge_matching_live_value_is_no_candidate() {
        let mut rows = make_rows();
        rows.set_value(0, &"tax".into(), FieldValue::Number(19.0));
        rows.set_value(0, &"currency".into(), text("EUR"));
        let mut ledger = ChangeLedger::new();
        let mut resolver = DependencyResolver::new();
        resolver.add_edge(currency_edge());
        resolver.add_edge(tax_edge().with_confirmation());

        let outcome = resolver.on_cell_changed(&mut rows, &mut ledger, 0, &"country".into());
        assert_eq!(outcome, ResolveOutcome::NoChange);
        assert_eq!(resolver.row_state(1), RowAutoFillState::Clean);
    }

    #[test]
    fn test_confirm_uses_current_values() {
        let mut rows = make_rows();
        let mut ledger = ChangeLedger::new();
        let mut resolver = DependencyResolver::new();
        resolver.add_edge(tax_edge().with_confirmation());

        resolver.on_cell_changed(&mut rows, &mut ledger, 0, &"country".into());
        assert_eq!(resolver.row_state(1), RowAutoFillState::PendingConfirmation);

        // The trigger moved again before the user confirmed.
        ledger
            .record_edit(&mut rows, CellAddress::new(0, "country"), text("us"))
            .unwrap();
        resolver.on_cell_changed(&mut rows, &mut ledger, 0, &"country".into());

        let applied = resolver.confirm(&mut rows, &mut ledger, 1);
        assert_eq!(applied, vec![ColumnKey::from("tax")]);
        assert_eq!(
            rows.value(0, &"tax".into()),
            FieldValue::Number(8.0),
            "confirmation derives from the current trigger value"
        );
        assert_eq!(resolver.row_state(1), RowAutoFillState::Clean);
    }

    #[test]
    fn test_confirm_with_nothing_to_apply_just_clears() {
        let mut rows = make_rows();
        rows.set_value(0, &"tax".into(), FieldValue::Number(19.0));
        let mut ledger = ChangeLedger::new();
        let mut resolver = DependencyResolver::new();
        resolver.add_edge(tax_edge().with_confirmation());

        resolver
            .row_states
            .insert(1, RowAutoFillState::PendingConfirmation);
        let applied = resolver.confirm(&mut rows, &mut ledger, 1);

        assert!(applied.is_empty());
        assert!(ledger.is_empty());
        assert_eq!(resolver.row_state(1), RowAutoFillState::Clean);
    }

    #[test]
    fn test_confirm_missing_row_clears_state() {
        let mut rows = make_rows();
        let mut ledger = ChangeLedger::new();
        let mut resolver = DependencyResolver::new();
        resolver
            .row_states
            .insert(42, RowAutoFillState::PendingConfirmation);

        let applied = resolver.confirm(&mut rows, &mut ledger, 42);
        assert!(applied.is_empty());
        assert!(!resolver.has_pending());
    }

    #[test]
    fn test_trigger_on_missing_row_is_no_change() {
        let mut rows = make_rows();
        let mut ledger = ChangeLedger::new();
        let mut resolver = DependencyResolver::new();
        resolver.add_edge(currency_edge());

        let outcome = resolver.on_cell_changed(&mut rows, &mut ledger, 7, &"country".into());
        assert_eq!(outcome, ResolveOutcome::NoChange);
    }

    #[test]
    fn test_clear_row_discards_deferred_batch() {
        let mut rows = make_rows();
        let mut ledger = ChangeLedger::new();
        let mut resolver = DependencyResolver::new();
        resolver.add_edge(tax_edge().with_confirmation());

        resolver.on_cell_changed(&mut rows, &mut ledger, 0, &"country".into());
        assert!(resolver.clear_row(1));

        assert_eq!(resolver.row_state(1), RowAutoFillState::Clean);
        assert_eq!(
            rows.value(0, &"tax".into()),
            FieldValue::Empty,
            "discarded batch is never applied"
        );
    }

    #[test]
    fn test_pending_rows_sorted() {
        let mut resolver = DependencyResolver::new();
        resolver
            .row_states
            .insert(9, RowAutoFillState::PendingConfirmation);
        resolver
            .row_states
            .insert(3, RowAutoFillState::PendingConfirmation);
        assert_eq!(resolver.pending_rows(), vec![3, 9]);
    }
}
