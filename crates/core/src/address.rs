//! Addressing for pending-change entries.
//!
//! A `CellAddress` names one editable cell as (row index, column key).
//! Row indexes are positional: they are NOT stable across row reordering
//! or deletion, and callers reconcile addresses when the dataset changes
//! shape.

use serde::{Deserialize, Serialize};

/// Stable, host-assigned identifier of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnKey(String);

impl ColumnKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ColumnKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ColumnKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of a single cell: row index plus column key.
///
/// Derived `Ord` is row-major, so a `BTreeMap<CellAddress, _>` iterates
/// rows ascending and column keys lexicographically within a row. That
/// iteration order is the stable commit order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    /// Row index (0-based, positional)
    pub row: usize,
    /// Column key
    pub column: ColumnKey,
}

impl CellAddress {
    pub fn new(row: usize, column: impl Into<ColumnKey>) -> Self {
        Self {
            row,
            column: column.into(),
        }
    }
}

impl std::fmt::Display for CellAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.column, self.row)
    }
}

/// Inclusive row range covered by a drag fill.
///
/// Always normalized so `start <= end`, whichever direction the drag ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    /// Build a normalized range from two endpoints in either order.
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn contains(&self, row: usize) -> bool {
        row >= self.start && row <= self.end
    }

    /// Number of rows covered (inclusive, never zero).
    pub fn count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn rows(&self) -> impl Iterator<Item = usize> {
        self.start..=self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_ordering_is_row_major() {
        let a = CellAddress::new(1, "zeta");
        let b = CellAddress::new(2, "alpha");
        let c = CellAddress::new(2, "beta");

        assert!(a < b, "lower row sorts first regardless of column");
        assert!(b < c, "same row sorts by column key");
    }

    #[test]
    fn test_address_btree_iteration_order() {
        use std::collections::BTreeMap;

        let mut map = BTreeMap::new();
        map.insert(CellAddress::new(3, "status"), ());
        map.insert(CellAddress::new(1, "name"), ());
        map.insert(CellAddress::new(3, "owner"), ());
        map.insert(CellAddress::new(2, "name"), ());

        let order: Vec<String> = map.keys().map(|a| a.to_string()).collect();
        assert_eq!(order, vec!["name[1]", "name[2]", "owner[3]", "status[3]"]);
    }

    #[test]
    fn test_row_range_normalizes_direction() {
        let up = RowRange::new(7, 3);
        let down = RowRange::new(3, 7);
        assert_eq!(up, down);
        assert_eq!(up.start, 3);
        assert_eq!(up.end, 7);
        assert_eq!(up.count(), 5);
    }

    #[test]
    fn test_row_range_contains() {
        let range = RowRange::new(2, 4);
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(3));
        assert!(range.contains(4));
        assert!(!range.contains(5));
    }

    #[test]
    fn test_row_range_single_row() {
        let range = RowRange::new(5, 5);
        assert_eq!(range.count(), 1);
        assert_eq!(range.rows().collect::<Vec<_>>(), vec![5]);
    }
}
