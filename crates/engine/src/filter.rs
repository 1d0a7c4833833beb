//! Value filters and the visibility view they produce.
//!
//! Evaluation is total: a row either passes or it does not, and
//! operators the engine does not recognize pass everything rather than
//! erroring. Distinct-value lists for a column's dropdown exclude that
//! column's own filter (cascading exclusion), group rows by normalized
//! `ValueKey`, and are cached per column until invalidated.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use gridflux_core::address::ColumnKey;
use gridflux_core::record::{Record, RowSet};
use gridflux_core::value::{FieldValue, ValueKey};
use ordered_float::OrderedFloat;

/// Default cap on distinct entries per dropdown list.
pub const DEFAULT_MAX_DISTINCT: usize = 1000;

// =============================================================================
// FilterView: visibility over the dataset
// =============================================================================

/// Which data rows pass the active filters, with a cache of visible
/// rows in dataset order.
#[derive(Debug, Clone)]
pub struct FilterView {
    visible_mask: Vec<bool>,
    /// Data row indexes of visible rows, in order.
    visible_rows: Vec<usize>,
}

impl FilterView {
    /// All rows visible.
    pub fn new(row_count: usize) -> Self {
        let mut view = Self {
            visible_mask: vec![true; row_count],
            visible_rows: Vec::new(),
        };
        view.rebuild_visible_cache();
        view
    }

    pub fn row_count(&self) -> usize {
        self.visible_mask.len()
    }

    pub fn visible_count(&self) -> usize {
        self.visible_rows.len()
    }

    pub fn is_visible(&self, data_row: usize) -> bool {
        self.visible_mask.get(data_row).copied().unwrap_or(false)
    }

    /// Visible data rows in dataset order.
    pub fn visible_rows(&self) -> &[usize] {
        &self.visible_rows
    }

    /// Data row of the nth visible row (what the window index ranges
    /// over when filters hide rows).
    pub fn nth_visible(&self, n: usize) -> Option<usize> {
        self.visible_rows.get(n).copied()
    }

    /// Position of a data row among the visible rows.
    pub fn visible_index_of(&self, data_row: usize) -> Option<usize> {
        self.visible_rows.binary_search(&data_row).ok()
    }

    pub fn is_filtered(&self) -> bool {
        self.visible_rows.len() != self.visible_mask.len()
    }

    pub fn apply(&mut self, visible_mask: Vec<bool>) {
        self.visible_mask = visible_mask;
        self.rebuild_visible_cache();
    }

    pub fn clear(&mut self) {
        self.visible_mask.fill(true);
        self.rebuild_visible_cache();
    }

    /// Resize after rows are added or truncated. New rows are visible
    /// until the next mask rebuild.
    pub fn resize(&mut self, row_count: usize) {
        self.visible_mask.resize(row_count, true);
        self.rebuild_visible_cache();
    }

    pub fn remove_row(&mut self, data_row: usize) {
        if data_row < self.visible_mask.len() {
            self.visible_mask.remove(data_row);
            self.rebuild_visible_cache();
        }
    }

    fn rebuild_visible_cache(&mut self) {
        self.visible_rows = self
            .visible_mask
            .iter()
            .enumerate()
            .filter(|(_, visible)| **visible)
            .map(|(row, _)| row)
            .collect();
    }
}

// =============================================================================
// Filter criteria
// =============================================================================

/// Filter operator. `Unsupported` is the permissive fallback for
/// operators this engine does not recognize: it passes everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    IsEmpty,
    IsNotEmpty,
    /// Value must be in the condition's selected set.
    In,
    Unsupported,
}

/// One condition against a single column's value.
#[derive(Debug, Clone)]
pub struct FilterCondition {
    pub operator: FilterOperator,
    /// Normalized keys, consulted by `In` only.
    pub values: HashSet<ValueKey>,
}

impl FilterCondition {
    pub fn is_empty() -> Self {
        Self {
            operator: FilterOperator::IsEmpty,
            values: HashSet::new(),
        }
    }

    pub fn is_not_empty() -> Self {
        Self {
            operator: FilterOperator::IsNotEmpty,
            values: HashSet::new(),
        }
    }

    pub fn in_set(values: impl IntoIterator<Item = ValueKey>) -> Self {
        Self {
            operator: FilterOperator::In,
            values: values.into_iter().collect(),
        }
    }

    /// Total: never errors, unknown operators pass.
    pub fn matches(&self, value: &FieldValue) -> bool {
        match self.operator {
            FilterOperator::IsEmpty => value.is_blank(),
            FilterOperator::IsNotEmpty => !value.is_blank(),
            FilterOperator::In => self.values.contains(&ValueKey::from_value(value)),
            FilterOperator::Unsupported => true,
        }
    }
}

/// How a filter's conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombineMode {
    #[default]
    And,
    Or,
}

/// Per-column filter criteria.
#[derive(Debug, Clone, Default)]
pub struct ColumnFilter {
    pub conditions: Vec<FilterCondition>,
    pub combine: CombineMode,
    pub active: bool,
}

impl ColumnFilter {
    /// Active `In` filter over the given keys (the dropdown's checkbox
    /// selection).
    pub fn selecting(values: impl IntoIterator<Item = ValueKey>) -> Self {
        Self {
            conditions: vec![FilterCondition::in_set(values)],
            combine: CombineMode::And,
            active: true,
        }
    }

    /// Active single-condition filter.
    pub fn with_condition(condition: FilterCondition) -> Self {
        Self {
            conditions: vec![condition],
            combine: CombineMode::And,
            active: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active && !self.conditions.is_empty()
    }

    /// Whether a value passes. Inactive filters pass everything.
    pub fn passes(&self, value: &FieldValue) -> bool {
        if !self.is_active() {
            return true;
        }
        match self.combine {
            CombineMode::And => self.conditions.iter().all(|c| c.matches(value)),
            CombineMode::Or => self.conditions.iter().any(|c| c.matches(value)),
        }
    }

    /// The filter's `In` selection, if it has one.
    pub fn selection(&self) -> Option<&HashSet<ValueKey>> {
        self.conditions
            .iter()
            .find(|c| c.operator == FilterOperator::In)
            .map(|c| &c.values)
    }
}

// =============================================================================
// Distinct values
// =============================================================================

/// One entry in a column's dropdown list.
#[derive(Debug, Clone, PartialEq)]
pub struct DistinctValueEntry {
    pub value: ValueKey,
    /// First-seen raw text for text values, formatted otherwise.
    pub display: String,
    pub count: usize,
    /// Whether the column's own `In` selection includes this value.
    pub selected: bool,
}

/// Sort key for dropdown entries. Blanks first, then numbers (with
/// numeric-looking text compared numerically), dates, booleans, text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ListSortKey {
    /// Blank(0) < Number(1) < Date(2) < Bool(3) < Text(4)
    type_rank: u8,
    number: OrderedFloat<f64>,
    date: Option<NaiveDate>,
    /// true sorts before false
    bool_rank: u8,
    /// Normalized text; for numeric-looking text this is the numeric
    /// tie-breaker, so "01" and "1" order deterministically.
    text: String,
}

impl ListSortKey {
    fn for_value(key: &ValueKey) -> Self {
        let mut sort_key = Self {
            type_rank: 4,
            number: OrderedFloat(0.0),
            date: None,
            bool_rank: 0,
            text: String::new(),
        };
        match key {
            ValueKey::Blank => sort_key.type_rank = 0,
            ValueKey::Number(n) => {
                sort_key.type_rank = 1;
                sort_key.number = *n;
            }
            ValueKey::Date(d) => {
                sort_key.type_rank = 2;
                sort_key.date = Some(*d);
            }
            ValueKey::Bool(b) => {
                sort_key.type_rank = 3;
                sort_key.bool_rank = if *b { 0 } else { 1 };
            }
            ValueKey::Text(s) => match s.parse::<f64>() {
                Ok(n) if n.is_finite() => {
                    sort_key.type_rank = 1;
                    sort_key.number = OrderedFloat(n);
                    sort_key.text = s.clone();
                }
                _ => {
                    sort_key.type_rank = 4;
                    sort_key.text = s.clone();
                }
            },
        }
        sort_key
    }
}

// =============================================================================
// FilterSet: per-column filters plus distinct-value cache
// =============================================================================

/// All column filters for a grid, with the cached dropdown lists.
#[derive(Debug, Default)]
pub struct FilterSet {
    column_filters: HashMap<ColumnKey, ColumnFilter>,
    /// Cached distinct-value lists per column. Counts honor cascading
    /// exclusion, so a change to one column's filter drops every other
    /// column's cache.
    unique_values_cache: HashMap<ColumnKey, Vec<DistinctValueEntry>>,
    max_distinct: usize,
}

impl FilterSet {
    pub fn new() -> Self {
        Self {
            column_filters: HashMap::new(),
            unique_values_cache: HashMap::new(),
            max_distinct: DEFAULT_MAX_DISTINCT,
        }
    }

    pub fn set_max_distinct(&mut self, cap: usize) {
        if cap != self.max_distinct {
            self.max_distinct = cap;
            self.unique_values_cache.clear();
        }
    }

    pub fn filter(&self, column: &ColumnKey) -> Option<&ColumnFilter> {
        self.column_filters.get(column)
    }

    pub fn has_active_filter(&self) -> bool {
        self.column_filters.values().any(|f| f.is_active())
    }

    pub fn active_columns(&self) -> impl Iterator<Item = &ColumnKey> {
        self.column_filters
            .iter()
            .filter(|(_, f)| f.is_active())
            .map(|(c, _)| c)
    }

    /// Install or replace a column's filter. Other columns' dropdown
    /// lists count against this filter, so their caches drop; the
    /// column's own list excludes its own filter and stays valid.
    pub fn set_filter(&mut self, column: ColumnKey, filter: ColumnFilter) {
        self.invalidate_except(&column);
        self.column_filters.insert(column, filter);
    }

    /// Remove a column's filter. Returns whether one existed.
    pub fn clear_filter(&mut self, column: &ColumnKey) -> bool {
        let removed = self.column_filters.remove(column).is_some();
        if removed {
            self.invalidate_except(column);
        }
        removed
    }

    pub fn clear_all(&mut self) {
        self.column_filters.clear();
        self.unique_values_cache.clear();
    }

    /// Invalidate one column's dropdown cache (call on cell edit in
    /// that column).
    pub fn invalidate_column(&mut self, column: &ColumnKey) {
        self.unique_values_cache.remove(column);
    }

    /// Invalidate every dropdown cache (row insert/delete, bulk loads).
    pub fn invalidate_all(&mut self) {
        self.unique_values_cache.clear();
    }

    fn invalidate_except(&mut self, keep: &ColumnKey) {
        self.unique_values_cache.retain(|column, _| column == keep);
    }

    /// Whether a row passes every active filter.
    pub fn row_passes(&self, record: &dyn Record) -> bool {
        self.row_passes_excluding(record, None)
    }

    fn row_passes_excluding(&self, record: &dyn Record, except: Option<&ColumnKey>) -> bool {
        self.column_filters.iter().all(|(column, filter)| {
            if Some(column) == except {
                return true;
            }
            !filter.is_active() || filter.passes(&record.get_field(column))
        })
    }

    /// Visibility mask over the dataset, one flag per row.
    pub fn visible_mask(&self, rows: &RowSet) -> Vec<bool> {
        rows.iter().map(|record| self.row_passes(record)).collect()
    }

    /// Distinct values for a column's dropdown.
    ///
    /// Candidate rows pass every active filter except this column's own,
    /// so the list shows what selecting a value would yield under the
    /// other filters. `selected` reflects the column's own `In`
    /// selection; with no selection everything reads selected.
    pub fn distinct_values(&mut self, column: &ColumnKey, rows: &RowSet) -> Vec<DistinctValueEntry> {
        if !self.unique_values_cache.contains_key(column) {
            let entries = self.build_distinct(column, rows);
            self.unique_values_cache.insert(column.clone(), entries);
        }

        let selection = self
            .column_filters
            .get(column)
            .filter(|f| f.is_active())
            .and_then(|f| f.selection());
        let mut entries = self.unique_values_cache[column].clone();
        if let Some(selected) = selection {
            for entry in &mut entries {
                entry.selected = selected.contains(&entry.value);
            }
        }
        entries
    }

    fn build_distinct(&self, column: &ColumnKey, rows: &RowSet) -> Vec<DistinctValueEntry> {
        // Group by normalized key, keeping the first-seen raw display.
        let mut groups: HashMap<ValueKey, (String, usize)> = HashMap::new();
        for record in rows.iter() {
            if !self.row_passes_excluding(record, Some(column)) {
                continue;
            }
            let value = record.get_field(column);
            let key = ValueKey::from_value(&value);
            let display = match &key {
                ValueKey::Text(_) => value.display(),
                other => other.display_string(),
            };
            groups
                .entry(key)
                .and_modify(|(_, count)| *count += 1)
                .or_insert((display, 1));
        }

        let mut entries: Vec<DistinctValueEntry> = groups
            .into_iter()
            .map(|(value, (display, count))| DistinctValueEntry {
                value,
                display,
                count,
                selected: true,
            })
            .collect();
        entries.sort_by_cached_key(|entry| ListSortKey::for_value(&entry.value));
        entries.truncate(self.max_distinct);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use gridflux_core::record::{ItemId, MapRecord};

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn date(s: &str) -> FieldValue {
        let dt = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
            .expect("test date must parse");
        FieldValue::Date(dt)
    }

    fn single_column(values: Vec<FieldValue>) -> RowSet {
        let mut rows = RowSet::new();
        for (i, v) in values.into_iter().enumerate() {
            rows.push(Box::new(MapRecord::new(1 + i as ItemId).with_field("col", v)));
        }
        rows
    }

    fn tickets() -> RowSet {
        let mut rows = RowSet::new();
        let data = [
            ("open", "ana"),
            ("open", "bo"),
            ("closed", "ana"),
            ("closed", "bo"),
            ("closed", ""),
        ];
        for (i, (status, owner)) in data.iter().enumerate() {
            rows.push(Box::new(
                MapRecord::new(1 + i as ItemId)
                    .with_field("status", text(status))
                    .with_field("owner", text(owner)),
            ));
        }
        rows
    }

    #[test]
    fn test_filter_view_identity() {
        let view = FilterView::new(4);
        assert_eq!(view.row_count(), 4);
        assert_eq!(view.visible_count(), 4);
        assert!(!view.is_filtered());
        for row in 0..4 {
            assert!(view.is_visible(row));
            assert_eq!(view.nth_visible(row), Some(row));
        }
    }

    #[test]
    fn test_filter_view_apply_and_clear() {
        let mut view = FilterView::new(5);
        view.apply(vec![true, false, true, false, true]);

        assert!(view.is_filtered());
        assert_eq!(view.visible_count(), 3);
        assert_eq!(view.visible_rows(), &[0, 2, 4]);
        assert_eq!(view.nth_visible(1), Some(2));
        assert_eq!(view.visible_index_of(4), Some(2));
        assert_eq!(view.visible_index_of(1), None);

        view.clear();
        assert!(!view.is_filtered());
        assert_eq!(view.visible_count(), 5);
    }

    #[test]
    fn test_filter_view_remove_row() {
        let mut view = FilterView::new(4);
        view.apply(vec![true, false, true, true]);
        view.remove_row(1);
        assert_eq!(view.row_count(), 3);
        assert_eq!(view.visible_rows(), &[0, 1, 2]);
    }

    #[test]
    fn test_in_filter_matches_normalized_key() {
        let condition = FilterCondition::in_set([ValueKey::from_value(&text("Open"))]);
        assert!(condition.matches(&text("open")));
        assert!(condition.matches(&text("  OPEN  ")));
        assert!(!condition.matches(&text("closed")));
    }

    #[test]
    fn test_blank_operators() {
        let is_empty = FilterCondition::is_empty();
        let is_not_empty = FilterCondition::is_not_empty();

        for blank in [FieldValue::Empty, text(""), text("   ")] {
            assert!(is_empty.matches(&blank));
            assert!(!is_not_empty.matches(&blank));
        }
        assert!(!is_empty.matches(&text("x")));
        assert!(is_not_empty.matches(&FieldValue::Number(0.0)));
    }

    #[test]
    fn test_unsupported_operator_passes_everything() {
        let condition = FilterCondition {
            operator: FilterOperator::Unsupported,
            values: HashSet::new(),
        };
        assert!(condition.matches(&text("anything")));
        assert!(condition.matches(&FieldValue::Empty));
    }

    #[test]
    fn test_blank_key_matches_blank_rows_not_literal_text() {
        let condition = FilterCondition::in_set([ValueKey::Blank]);
        assert!(condition.matches(&FieldValue::Empty));
        assert!(condition.matches(&text("  ")));
        assert!(
            !condition.matches(&text("(Blanks)")),
            "the sentinel is structural, not a text match"
        );
    }

    #[test]
    fn test_combine_modes() {
        let both = ColumnFilter {
            conditions: vec![
                FilterCondition::is_not_empty(),
                FilterCondition::in_set([ValueKey::from_value(&text("open"))]),
            ],
            combine: CombineMode::And,
            active: true,
        };
        assert!(both.passes(&text("open")));
        assert!(!both.passes(&text("closed")));

        let either = ColumnFilter {
            combine: CombineMode::Or,
            ..both.clone()
        };
        assert!(either.passes(&text("closed")), "non-blank satisfies the Or");
        assert!(!either.passes(&FieldValue::Empty));
    }

    #[test]
    fn test_inactive_filter_passes_all() {
        let mut filter = ColumnFilter::selecting([ValueKey::from_value(&text("open"))]);
        filter.active = false;
        assert!(filter.passes(&text("closed")));
        assert!(filter.passes(&FieldValue::Empty));
    }

    #[test]
    fn test_visible_mask() {
        let rows = tickets();
        let mut filters = FilterSet::new();
        filters.set_filter(
            "status".into(),
            ColumnFilter::selecting([ValueKey::from_value(&text("open"))]),
        );

        assert_eq!(
            filters.visible_mask(&rows),
            vec![true, true, false, false, false]
        );
    }

    #[test]
    fn test_distinct_counts_and_first_seen_display() {
        let rows = single_column(vec![
            text("Ana"),
            text("ana"),
            text("ANA"),
            text("bo"),
        ]);
        let mut filters = FilterSet::new();
        let entries = filters.distinct_values(&"col".into(), &rows);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].display, "Ana", "first-seen raw casing wins");
        assert_eq!(entries[0].count, 3);
        assert_eq!(entries[1].display, "bo");
        assert_eq!(entries[1].count, 1);
    }

    #[test]
    fn test_distinct_cascading_exclusion() {
        let rows = tickets();
        let mut filters = FilterSet::new();
        filters.set_filter(
            "status".into(),
            ColumnFilter::selecting([ValueKey::from_value(&text("open"))]),
        );

        // Owner list counts only rows passing the status filter.
        let owners = filters.distinct_values(&"owner".into(), &rows);
        let counts: Vec<(String, usize)> = owners
            .iter()
            .map(|e| (e.display.clone(), e.count))
            .collect();
        assert_eq!(counts, vec![("ana".to_string(), 1), ("bo".to_string(), 1)]);

        // Status's own list ignores its own filter: both values remain.
        let statuses = filters.distinct_values(&"status".into(), &rows);
        assert_eq!(statuses.len(), 2);
        let closed = statuses.iter().find(|e| e.display == "closed").unwrap();
        assert_eq!(closed.count, 3);
        assert!(!closed.selected);
        let open = statuses.iter().find(|e| e.display == "open").unwrap();
        assert!(open.selected);
    }

    #[test]
    fn test_distinct_blanks_first_then_numeric_then_text() {
        let rows = single_column(vec![
            text("10"),
            FieldValue::Number(2.0),
            text("apple"),
            FieldValue::Empty,
            text("01"),
        ]);
        let mut filters = FilterSet::new();
        let entries = filters.distinct_values(&"col".into(), &rows);

        let displays: Vec<&str> = entries.iter().map(|e| e.display.as_str()).collect();
        assert_eq!(displays, vec!["(Blanks)", "01", "2", "10", "apple"]);
    }

    #[test]
    fn test_distinct_leading_zero_text_stays_distinct_from_number() {
        let rows = single_column(vec![text("01"), FieldValue::Number(1.0), text("1")]);
        let mut filters = FilterSet::new();
        let entries = filters.distinct_values(&"col".into(), &rows);

        // Three distinct keys, all ordered by numeric value then text.
        assert_eq!(entries.len(), 3);
        let displays: Vec<&str> = entries.iter().map(|e| e.display.as_str()).collect();
        assert_eq!(displays, vec!["1", "01", "1"]);
        assert_eq!(entries[0].value, ValueKey::Number(OrderedFloat(1.0)));
    }

    #[test]
    fn test_distinct_dates_group_by_day_and_sort_chronologically() {
        let rows = single_column(vec![
            date("2024-03-05 09:30"),
            date("2024-03-05 17:45"),
            date("2024-01-20 00:00"),
        ]);
        let mut filters = FilterSet::new();
        let entries = filters.distinct_values(&"col".into(), &rows);

        assert_eq!(entries.len(), 2, "same-day timestamps group together");
        assert_eq!(entries[0].display, "2024-01-20");
        assert_eq!(entries[1].display, "2024-03-05");
        assert_eq!(entries[1].count, 2);
    }

    #[test]
    fn test_distinct_bools_true_before_false() {
        let rows = single_column(vec![
            FieldValue::Bool(false),
            FieldValue::Bool(true),
            FieldValue::Bool(false),
        ]);
        let mut filters = FilterSet::new();
        let entries = filters.distinct_values(&"col".into(), &rows);

        assert_eq!(entries[0].display, "Yes");
        assert_eq!(entries[0].count, 1);
        assert_eq!(entries[1].display, "No");
        assert_eq!(entries[1].count, 2);
    }

    #[test]
    fn test_distinct_cache_rebuilds_after_invalidation() {
        let mut rows = single_column(vec![text("a"), text("b")]);
        let mut filters = FilterSet::new();

        let before = filters.distinct_values(&"col".into(), &rows);
        assert_eq!(before.len(), 2);

        rows.set_value(1, &"col".into(), text("a"));
        // Stale until invalidated.
        assert_eq!(filters.distinct_values(&"col".into(), &rows).len(), 2);

        filters.invalidate_column(&"col".into());
        let after = filters.distinct_values(&"col".into(), &rows);
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].count, 2);
    }

    #[test]
    fn test_changing_one_filter_drops_other_columns_caches() {
        let rows = tickets();
        let mut filters = FilterSet::new();

        let owners_before = filters.distinct_values(&"owner".into(), &rows);
        assert_eq!(owners_before.iter().map(|e| e.count).sum::<usize>(), 5);

        filters.set_filter(
            "status".into(),
            ColumnFilter::selecting([ValueKey::from_value(&text("open"))]),
        );
        let owners_after = filters.distinct_values(&"owner".into(), &rows);
        assert_eq!(
            owners_after.iter().map(|e| e.count).sum::<usize>(),
            2,
            "owner counts must honor the new status filter"
        );
    }

    #[test]
    fn test_max_distinct_caps_list_but_keeps_blanks() {
        let rows = single_column(vec![
            text("c"),
            text("a"),
            FieldValue::Empty,
            text("b"),
        ]);
        let mut filters = FilterSet::new();
        filters.set_max_distinct(2);

        let entries = filters.distinct_values(&"col".into(), &rows);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].display, "(Blanks)");
        assert_eq!(entries[1].display, "a");
    }
}
