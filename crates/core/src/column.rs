//! Column metadata.

use serde::{Deserialize, Serialize};

use crate::address::ColumnKey;

/// Data type of a column. Drives input parsing, validation, and the
/// type-aware ordering of distinct-value lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Text,
    Number,
    Date,
    Bool,
    /// Value restricted to an option list loaded by the host.
    Choice,
}

/// Column metadata supplied by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub key: ColumnKey,
    pub display_name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(key: impl Into<ColumnKey>, display_name: &str, data_type: DataType) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.to_string(),
            data_type,
        }
    }
}
