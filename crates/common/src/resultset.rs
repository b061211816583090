//! Paginated result sets and timed query results
//!
//! The database driver owns the cursor. The engine only ever reads forward
//! through [`ResultSet::fetch_page`], one page at a time.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::Result;
use crate::value::Row;

/// A forward-only, non-rewindable cursor over result rows
pub trait ResultSet {
    /// Fetch up to `size` rows. Returns fewer rows (possibly none) only at or
    /// after exhaustion and never returns a row twice.
    fn fetch_page(&mut self, size: usize) -> Result<Vec<Row>>;
}

impl<R: ResultSet + ?Sized> ResultSet for Box<R> {
    fn fetch_page(&mut self, size: usize) -> Result<Vec<Row>> {
        (**self).fetch_page(size)
    }
}

/// Result set backed by rows already in memory (document queries, fixtures,
/// drivers that buffer on execute)
#[derive(Debug, Clone, Default)]
pub struct MemoryResultSet {
    rows: VecDeque<Row>,
}

impl MemoryResultSet {
    pub fn new(rows: impl IntoIterator<Item = Row>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
        }
    }

    /// Build a result set from JSON documents, one row per document
    pub fn from_documents(documents: &[serde_json::Value]) -> Result<Self> {
        let rows = documents
            .iter()
            .map(Row::from_json)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rows))
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl ResultSet for MemoryResultSet {
    fn fetch_page(&mut self, size: usize) -> Result<Vec<Row>> {
        let take = size.min(self.rows.len());
        Ok(self.rows.drain(..take).collect())
    }
}

/// Result set of a query that never produced rows
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyResultSet;

impl ResultSet for EmptyResultSet {
    fn fetch_page(&mut self, _size: usize) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }
}

/// Everything known about one executed query
pub struct QueryResult {
    /// Wall-clock time the query took, measured once by the executor
    pub required_time: Duration,
    /// The rows; reading drains the underlying cursor
    pub result: Box<dyn ResultSet>,
    pub query: String,
    pub alias: String,
    /// Upstream (driver) error, if the query failed
    pub error_message: Option<String>,
}

impl QueryResult {
    pub fn new(
        alias: impl Into<String>,
        query: impl Into<String>,
        required_time: Duration,
        result: impl ResultSet + 'static,
    ) -> Self {
        Self {
            required_time,
            result: Box::new(result),
            query: query.into(),
            alias: alias.into(),
            error_message: None,
        }
    }

    /// A query that failed upstream; its result set is empty
    pub fn failed(
        alias: impl Into<String>,
        query: impl Into<String>,
        required_time: Duration,
        message: impl Into<String>,
    ) -> Self {
        Self {
            required_time,
            result: Box::new(EmptyResultSet),
            query: query.into(),
            alias: alias.into(),
            error_message: Some(message.into()),
        }
    }

    /// In-memory query result, handy for fixtures and document stores
    pub fn from_rows(alias: impl Into<String>, rows: impl IntoIterator<Item = Row>) -> Self {
        Self::new(alias, "", Duration::ZERO, MemoryResultSet::new(rows))
    }

    pub fn with_required_time(mut self, required_time: Duration) -> Self {
        self.required_time = required_time;
        self
    }

    pub fn has_error(&self) -> bool {
        self.error_message.as_deref().map_or(false, |m| !m.is_empty())
    }

    /// Fetch the next page from the underlying cursor
    pub fn fetch_page(&mut self, size: usize) -> Result<Vec<Row>> {
        let page = self.result.fetch_page(size)?;
        debug!(alias = %self.alias, requested = size, fetched = page.len(), "fetched page");
        Ok(page)
    }

    /// Drain the cursor completely, page by page
    pub fn fetch_all(&mut self, page_size: usize) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        loop {
            let page = self.fetch_page(page_size)?;
            if page.is_empty() {
                return Ok(rows);
            }
            rows.extend(page);
        }
    }
}

impl ResultSet for QueryResult {
    fn fetch_page(&mut self, size: usize) -> Result<Vec<Row>> {
        QueryResult::fetch_page(self, size)
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("alias", &self.alias)
            .field("query", &self.query)
            .field("required_time", &self.required_time)
            .field("error_message", &self.error_message)
            .finish_non_exhaustive()
    }
}

/// Run `execute` under a wall-clock timer and wrap its outcome as a
/// [`QueryResult`]. An execution error becomes the result's `error_message`.
pub fn timed_query<F, R, E>(alias: &str, query: &str, execute: F) -> QueryResult
where
    F: FnOnce(&str) -> std::result::Result<R, E>,
    R: ResultSet + 'static,
    E: fmt::Display,
{
    let start = Instant::now();
    let outcome = execute(query);
    let elapsed = start.elapsed();

    match outcome {
        Ok(result_set) => {
            debug!(alias, elapsed_ms = elapsed.as_millis() as u64, "query executed");
            QueryResult::new(alias, query, elapsed, result_set)
        }
        Err(e) => {
            warn!(alias, "query failed: {}", e);
            QueryResult::failed(alias, query, elapsed, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: i64) -> Vec<Row> {
        (0..n).map(|i| Row::new().with("id", i)).collect()
    }

    #[test]
    fn test_memory_result_set_pages_then_exhausts() {
        let mut rs = MemoryResultSet::new(rows(5));
        assert_eq!(rs.fetch_page(2).unwrap().len(), 2);
        assert_eq!(rs.fetch_page(2).unwrap().len(), 2);
        assert_eq!(rs.fetch_page(2).unwrap().len(), 1);
        assert!(rs.fetch_page(2).unwrap().is_empty());
        assert!(rs.fetch_page(2).unwrap().is_empty());
    }

    #[test]
    fn test_timed_query_captures_error() {
        let result = timed_query("broken", "SELEC 1", |_| {
            Err::<MemoryResultSet, _>("syntax error near SELEC")
        });
        assert!(result.has_error());
        assert_eq!(result.alias, "broken");
        assert_eq!(result.error_message.as_deref(), Some("syntax error near SELEC"));
    }

    #[test]
    fn test_timed_query_passes_rows_through() {
        let mut result = timed_query("ok", "SELECT id", |q| {
            assert_eq!(q, "SELECT id");
            Ok::<_, String>(MemoryResultSet::new(rows(3)))
        });
        assert!(!result.has_error());
        assert_eq!(result.fetch_all(2).unwrap().len(), 3);
    }

    #[test]
    fn test_from_documents() {
        let docs = vec![serde_json::json!({"_id": 1}), serde_json::json!({"_id": 2})];
        let mut rs = MemoryResultSet::from_documents(&docs).unwrap();
        assert_eq!(rs.remaining(), 2);
        assert_eq!(rs.fetch_page(10).unwrap()[1].get("_id"), Some(&crate::Value::Int(2)));
    }
}
