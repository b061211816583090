//! Error types for the suite runner

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Suite parse error: {0}")]
    SpecParse(String),

    #[error("Suite not found: {0}")]
    NotFound(String),

    #[error("Step '{step}' is invalid: {reason}")]
    InvalidStep { step: String, reason: String },

    #[error("Assertion error: {0}")]
    Assertion(#[from] lighttest_common::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] lighttest_sql::SqlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type RunnerResult<T> = Result<T, RunnerError>;
