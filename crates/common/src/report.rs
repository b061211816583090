//! Report records for query assertions
//!
//! Reports are store-agnostic: every row in them is normalized, so decimals
//! appear as integers whatever database produced them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::performance::{Positivity, Verdict};
use crate::result::Discrepancy;
use crate::value::Row;

/// Serializable record of one assertion, handed to reporting sinks
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub alias: String,
    pub assertion_type: String,
    pub query: String,
    pub expected_query_timelimit: f64,
    pub required_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub positivity: Positivity,
    pub critical_step: bool,
    pub verdict: Verdict,
    pub errors: Vec<Discrepancy>,
    pub not_found_rows: Vec<Row>,
    pub expected_result: Vec<Row>,
    pub actual_result: Vec<Row>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl QueryReport {
    /// One-line human summary
    pub fn summary(&self) -> String {
        format!(
            "[{}] {} ({}): {} error(s), {} not found, {:.3}s / limit {:.3}s",
            self.verdict,
            self.alias,
            self.assertion_type,
            self.errors.len(),
            self.not_found_rows.len(),
            self.required_time,
            self.expected_query_timelimit,
        )
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
