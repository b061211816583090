//! Error types for LightTest
//!
//! Only caller misuse and collaborator failures are errors. Rows that do not
//! match are assertion data and live in [`crate::QueryAssertionResult`].

use thiserror::Error;

use crate::value::Row;

/// Result type alias using LightTest Error
pub type Result<T> = std::result::Result<T, Error>;

/// LightTest error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Expected row has no identifier column '{column}': {row}")]
    MissingIdentifier { column: String, row: Row },

    #[error("Assertion '{0}' requires an expected result")]
    MissingExpectedResult(String),

    #[error("Assertion '{0}' requires an identifier column name")]
    MissingColumnName(String),

    #[error("Invalid fetch size: {0} (must be at least 1)")]
    InvalidFetchSize(usize),

    #[error("Invalid performance limit: {0}s (must be a positive number)")]
    InvalidPerformanceLimit(f64),

    #[error("Invalid decimal literal: {0:?}")]
    InvalidDecimal(String),

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error stems from how the assertion was called rather
    /// than from a collaborator
    pub fn is_caller_misuse(&self) -> bool {
        matches!(
            self,
            Error::MissingIdentifier { .. }
                | Error::MissingExpectedResult(_)
                | Error::MissingColumnName(_)
                | Error::InvalidFetchSize(_)
                | Error::InvalidPerformanceLimit(_)
                | Error::InvalidDecimal(_)
                | Error::InvalidRow(_)
                | Error::InvalidConfig(_)
        )
    }
}
