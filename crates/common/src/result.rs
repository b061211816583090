//! Outcome of a single assertion invocation

use serde::Serialize;

use crate::compare::DiffRecord;
use crate::value::Row;

/// One entry of [`QueryAssertionResult::errors`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    /// Expected row never seen verbatim in the actual result
    Row(Row),
    /// Expected occurrence with no actual counterpart (exact match)
    Missing(Row),
    /// Actual occurrence nobody expected (exact match)
    Unexpected(Row),
    /// Field-level difference of an id-matched row pair
    Field(DiffRecord),
    /// Custom predicate rejected the result
    Predicate { detail: String },
    /// The query itself failed upstream
    QueryFailed { alias: String, message: String },
}

impl Discrepancy {
    pub fn as_diff(&self) -> Option<&DiffRecord> {
        match self {
            Discrepancy::Field(diff) => Some(diff),
            _ => None,
        }
    }
}

/// What an assertion strategy found. It never decides pass/fail by itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryAssertionResult {
    pub errors: Vec<Discrepancy>,
    /// Expected rows whose identifier never appeared in the actual result
    pub not_found_rows: Vec<Row>,
    /// Actual rows observed while draining the result set
    pub query_result: Vec<Row>,
}

impl QueryAssertionResult {
    /// Uniform result for a query that failed upstream
    pub fn query_failed(alias: &str, message: &str) -> Self {
        Self {
            errors: vec![Discrepancy::QueryFailed {
                alias: alias.to_string(),
                message: message.to_string(),
            }],
            not_found_rows: Vec::new(),
            query_result: Vec::new(),
        }
    }

    /// No errors and nothing left unfound
    pub fn is_match(&self) -> bool {
        self.errors.is_empty() && self.not_found_rows.is_empty()
    }

    /// Field-level diff records only
    pub fn diffs(&self) -> impl Iterator<Item = &DiffRecord> {
        self.errors.iter().filter_map(Discrepancy::as_diff)
    }
}
