//! Input parsing and validation for cell edits.
//!
//! `parse_input` turns raw editor text into a typed `FieldValue` for
//! the column, trying formats in a fixed order with early returns.
//!
//! ## Choice matching
//!
//! Choice membership is case-insensitive against the loaded option
//! list. A strict Choice column whose options have not loaded yet
//! accepts the value; strictness applies once the list is available.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use gridflux_core::column::{Column, DataType};
use gridflux_core::value::FieldValue;

use crate::error::ValidationError;

/// Parse raw editor input into a typed value for the column.
/// Whitespace-only input is a blank, whatever the column type.
pub fn parse_input(input: &str, column: &Column) -> Result<FieldValue, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(FieldValue::Empty);
    }
    match column.data_type {
        // Raw text is kept as typed; "01" stays "01".
        DataType::Text | DataType::Choice => Ok(FieldValue::Text(input.to_string())),
        DataType::Number => parse_number(trimmed, column),
        DataType::Date => parse_date(trimmed, column),
        DataType::Bool => parse_bool(trimmed, column),
    }
}

fn parse_number(trimmed: &str, column: &Column) -> Result<FieldValue, ValidationError> {
    let n: f64 = trimmed.parse().map_err(|_| ValidationError::Parse {
        column: column.key.to_string(),
        input: trimmed.to_string(),
        expected: "a number",
    })?;
    if !n.is_finite() {
        return Err(ValidationError::NonFinite {
            column: column.key.to_string(),
        });
    }
    Ok(FieldValue::Number(n))
}

fn parse_date(trimmed: &str, column: &Column) -> Result<FieldValue, ValidationError> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M") {
        return Ok(FieldValue::Date(dt));
    }
    for format in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(FieldValue::Date(date.and_time(NaiveTime::MIN)));
        }
    }
    Err(ValidationError::Parse {
        column: column.key.to_string(),
        input: trimmed.to_string(),
        expected: "a date (YYYY-MM-DD)",
    })
}

fn parse_bool(trimmed: &str, column: &Column) -> Result<FieldValue, ValidationError> {
    match trimmed.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Ok(FieldValue::Bool(true)),
        "no" | "n" | "false" | "0" => Ok(FieldValue::Bool(false)),
        _ => Err(ValidationError::Parse {
            column: column.key.to_string(),
            input: trimmed.to_string(),
            expected: "yes or no",
        }),
    }
}

/// Validate a typed value against its column. Blank values always pass.
///
/// `options` is the column's loaded choice list; with `strict_choice`
/// set, a Choice value outside the list is rejected.
pub fn validate_value(
    value: &FieldValue,
    column: &Column,
    options: Option<&[String]>,
    strict_choice: bool,
) -> Result<(), ValidationError> {
    if value.is_blank() {
        return Ok(());
    }
    match (column.data_type, value) {
        (DataType::Number, FieldValue::Number(n)) if !n.is_finite() => {
            Err(ValidationError::NonFinite {
                column: column.key.to_string(),
            })
        }
        (DataType::Choice, FieldValue::Text(s)) if strict_choice => {
            let Some(options) = options else {
                return Ok(());
            };
            if options.iter().any(|o| o.eq_ignore_ascii_case(s.trim())) {
                Ok(())
            } else {
                Err(ValidationError::NotAnOption {
                    column: column.key.to_string(),
                    value: s.clone(),
                })
            }
        }
        _ => Ok(()),
    }
}
