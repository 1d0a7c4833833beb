//! Field values and normalized grouping keys.
//!
//! `FieldValue` is the typed payload of a record field. `ValueKey` is its
//! normalized form, used for filter matching and distinct-value grouping:
//! dates collapse to day granularity, text is trimmed and lowercased,
//! blanks (empty or whitespace-only) collapse to a single key.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Typed value of a single record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Empty
    }
}

impl FieldValue {
    /// Blank means empty or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Display string shown in a grid cell.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Empty => String::new(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => format_number(*n),
            FieldValue::Bool(b) => if *b { "Yes" } else { "No" }.to_string(),
            FieldValue::Date(dt) => {
                if dt.time() == NaiveTime::MIN {
                    dt.format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M").to_string()
                }
            }
        }
    }

    /// Normalized key for this value.
    pub fn key(&self) -> ValueKey {
        ValueKey::from_value(self)
    }
}

/// Format a number without a trailing fraction when it is integral.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Normalized key for filter matching and distinct-value grouping.
///
/// Stores the comparison form, not the display form: text is trimmed and
/// lowercased (digits untouched, so "01" and "1" remain distinct keys),
/// dates carry only the day, blanks collapse to `Blank`. A literal
/// "(Blanks)" string stays a `Text` key and never aliases `Blank`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey {
    Blank,
    Bool(bool),
    Number(OrderedFloat<f64>),
    Date(NaiveDate),
    Text(String),
}

impl ValueKey {
    /// Build the normalized key for a field value.
    pub fn from_value(value: &FieldValue) -> Self {
        match value {
            FieldValue::Empty => ValueKey::Blank,
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    ValueKey::Blank
                } else {
                    ValueKey::Text(trimmed.to_lowercase())
                }
            }
            FieldValue::Number(n) => ValueKey::Number(OrderedFloat(*n)),
            FieldValue::Bool(b) => ValueKey::Bool(*b),
            FieldValue::Date(dt) => ValueKey::Date(dt.date()),
        }
    }

    /// Display string for distinct-value lists.
    pub fn display_string(&self) -> String {
        match self {
            ValueKey::Blank => "(Blanks)".to_string(),
            ValueKey::Bool(b) => if *b { "Yes" } else { "No" }.to_string(),
            ValueKey::Number(n) => format_number(n.0),
            ValueKey::Date(d) => d.format("%Y-%m-%d").to_string(),
            ValueKey::Text(s) => s.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, ValueKey::Blank)
    }
}
