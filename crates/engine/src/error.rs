use std::fmt;

/// Rejected editor input. Raised before anything reaches the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Input text does not parse as the column's data type.
    Parse {
        column: String,
        input: String,
        expected: &'static str,
    },
    /// Numeric value is NaN or infinite.
    NonFinite { column: String },
    /// Choice value is not in the column's loaded option list.
    NotAnOption { column: String, value: String },
    /// Column key is not part of the schema.
    UnknownColumn(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse {
                column,
                input,
                expected,
            } => {
                write!(f, "column '{column}': cannot parse '{input}' as {expected}")
            }
            Self::NonFinite { column } => {
                write!(f, "column '{column}': number must be finite")
            }
            Self::NotAnOption { column, value } => {
                write!(f, "column '{column}': '{value}' is not an available option")
            }
            Self::UnknownColumn(key) => write!(f, "unknown column: {key}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Failure inside a dependency edge's derive function.
///
/// The failing edge is skipped and logged; sibling edges and other rows
/// are unaffected.
#[derive(Debug, Clone, PartialEq)]
pub struct DeriveError {
    pub message: String,
}

impl DeriveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for DeriveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "derive failed: {}", self.message)
    }
}

impl std::error::Error for DeriveError {}

/// Commit-sink failure. The ledger is left untouched so the commit can
/// be retried.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitError {
    /// The sink rejected the whole batch (transport or storage failure).
    Sink(String),
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sink(msg) => write!(f, "commit sink failed: {msg}"),
        }
    }
}

impl std::error::Error for CommitError {}

/// Addressing failure on a ledger write path.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// The addressed row does not exist.
    RowMissing(usize),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowMissing(row) => write!(f, "row {row} does not exist"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Failure of a grid edit operation.
#[derive(Debug, Clone, PartialEq)]
pub enum EditError {
    Validation(ValidationError),
    Ledger(LedgerError),
}

impl From<ValidationError> for EditError {
    fn from(e: ValidationError) -> Self {
        EditError::Validation(e)
    }
}

impl From<LedgerError> for EditError {
    fn from(e: LedgerError) -> Self {
        EditError::Ledger(e)
    }
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{e}"),
            Self::Ledger(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EditError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = ValidationError::Parse {
            column: "age".to_string(),
            input: "abc".to_string(),
            expected: "number",
        };
        assert_eq!(e.to_string(), "column 'age': cannot parse 'abc' as number");

        let e = LedgerError::RowMissing(12);
        assert_eq!(e.to_string(), "row 12 does not exist");

        let e = CommitError::Sink("connection reset".to_string());
        assert_eq!(e.to_string(), "commit sink failed: connection reset");
    }

    #[test]
    fn test_edit_error_wraps_both_sources() {
        let v: EditError = ValidationError::UnknownColumn("ghost".to_string()).into();
        let l: EditError = LedgerError::RowMissing(3).into();
        assert_eq!(v.to_string(), "unknown column: ghost");
        assert_eq!(l.to_string(), "row 3 does not exist");
    }
}
