// src/error.rs

use thiserror::Error;

/// Failures the pipeline reports with a specific shape.
///
/// Everything else (I/O, SQLite, HTTP transport) travels as `anyhow::Error`
/// with context attached at the call site.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("fetching {location} failed: {reason}")]
    Fetch { location: String, reason: String },

    #[error("source layout changed: {0}")]
    Layout(String),

    #[error("row {row}: field `{field}` is not numeric: {text:?}")]
    Coercion {
        row: usize,
        field: String,
        text: String,
    },

    #[error("exchange-rate table has no rate for {0}")]
    MissingRate(String),

    #[error("table already transformed: {0}")]
    AlreadyTransformed(String),

    #[error("unknown field `{0}`")]
    UnknownField(String),
}
