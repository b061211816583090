//! Error types for SQL execution

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Unsupported parameter type: {0}")]
    UnsupportedParameter(&'static str),

    #[error("Invalid value in column '{column}': {reason}")]
    InvalidValue { column: String, reason: String },
}

pub type SqlResult<T> = Result<T, SqlError>;
