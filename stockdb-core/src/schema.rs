//! Canonical table schemas.
//!
//! Every frame that reaches a table merge must match these schemas exactly
//! (names, order, and dtypes). The normalizer guarantees this for history
//! data; `validate_frame` is the backstop the store runs before a merge.

use polars::prelude::*;
use thiserror::Error;

/// Canonical column order for a history table row.
pub const HISTORY_COLUMNS: [&str; 8] = [
    "date", "ticker", "company", "open", "high", "low", "close", "volume",
];

/// Columns that must be non-null for a history row to be mergeable.
pub const HISTORY_REQUIRED: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Schema of a stored history row: one trading day for one ticker.
///
/// `company` is nullable — a ticker can have price history before (or
/// without) equity metadata.
pub fn history_schema() -> Schema {
    Schema::from_iter(vec![
        Field::new("date".into(), DataType::Date),
        Field::new("ticker".into(), DataType::String),
        Field::new("company".into(), DataType::String),
        Field::new("open".into(), DataType::Float32),
        Field::new("high".into(), DataType::Float32),
        Field::new("low".into(), DataType::Float32),
        Field::new("close".into(), DataType::Float32),
        Field::new("volume".into(), DataType::Int64),
    ])
}

/// Schema of per-ticker frames before the equity join attaches `company`.
pub fn history_fetch_schema() -> Schema {
    Schema::from_iter(vec![
        Field::new("date".into(), DataType::Date),
        Field::new("open".into(), DataType::Float32),
        Field::new("high".into(), DataType::Float32),
        Field::new("low".into(), DataType::Float32),
        Field::new("close".into(), DataType::Float32),
        Field::new("volume".into(), DataType::Int64),
        Field::new("ticker".into(), DataType::String),
    ])
}

/// Schema of the read-only equity reference table.
pub fn equity_schema() -> Schema {
    Schema::from_iter(vec![
        Field::new("symbol".into(), DataType::String),
        Field::new("company".into(), DataType::String),
        Field::new("index_symbol".into(), DataType::List(Box::new(DataType::String))),
        Field::new("series".into(), DataType::String),
        Field::new("listing_date".into(), DataType::Date),
    ])
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}

/// Validate a frame against an expected schema (presence and dtypes).
pub fn validate_frame(df: &DataFrame, expected: &Schema) -> Result<(), SchemaError> {
    let actual = df.schema();

    for field in expected.iter_fields() {
        let actual_dtype = actual
            .get(field.name())
            .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
        if actual_dtype != field.dtype() {
            return Err(SchemaError::TypeMismatch {
                column: field.name().to_string(),
                expected: field.dtype().clone(),
                actual: actual_dtype.clone(),
            });
        }
    }

    Ok(())
}
