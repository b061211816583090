//! Assertion strategies
//!
//! Every strategy consumes the actual [`QueryResult`] (and, for the
//! comparator, a second one as the expectation) and returns a
//! [`QueryAssertionResult`]. None of them decides pass/fail; that happens in
//! [`crate::assertion`].

use tracing::debug;

use crate::error::{Error, Result};
use crate::matcher::require_identifier;
use crate::pagination::{retire_verbatim, PageDriver, Reconciler, RowBag};
use crate::predicate::Predicate;
use crate::result::{Discrepancy, QueryAssertionResult};
use crate::resultset::QueryResult;
use crate::value::{normalize_all, Row};

/// One way of reconciling an actual result with an expectation
pub trait AssertionStrategy {
    /// Name used in reports and logs
    fn name(&self) -> &'static str;

    /// Check the strategy's own arguments before any cursor is touched
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Upstream error of a query-backed expectation, if any
    fn expectation_error(&self) -> Option<&str> {
        None
    }

    /// Expected rows known so far, for reporting
    fn expected_rows(&self) -> Vec<Row>;

    /// Drain `actual` and reconcile it with the expectation
    fn assert(&mut self, actual: &mut QueryResult, fetch_size: usize) -> Result<QueryAssertionResult>;
}

/// Actual and expected must hold the same rows with the same multiplicity,
/// in any order
#[derive(Debug, Clone)]
pub struct ExactMatch {
    expected: Vec<Row>,
}

impl ExactMatch {
    pub fn new(expected: Vec<Row>) -> Self {
        Self { expected }
    }
}

impl AssertionStrategy for ExactMatch {
    fn name(&self) -> &'static str {
        "exact_match"
    }

    fn expected_rows(&self) -> Vec<Row> {
        self.expected.clone()
    }

    fn assert(&mut self, actual: &mut QueryResult, fetch_size: usize) -> Result<QueryAssertionResult> {
        let mut driver = PageDriver::new(actual, fetch_size);
        let mut observed = Vec::new();
        while let Some(page) = driver.next_page()? {
            observed.extend(page);
        }

        let expected = normalize_all(&self.expected);
        let mut expected_bag = RowBag::default();
        for row in &expected {
            expected_bag.insert(row);
        }

        let mut errors = Vec::new();
        for row in &observed {
            if !expected_bag.take(row) {
                errors.push(Discrepancy::Unexpected(row.clone()));
            }
        }
        // what is left in the bag was never seen
        for row in &expected {
            if expected_bag.take(row) {
                errors.push(Discrepancy::Missing(row.clone()));
            }
        }

        debug!(expected = expected.len(), actual = observed.len(), errors = errors.len(), "exact match");
        Ok(QueryAssertionResult {
            errors,
            not_found_rows: Vec::new(),
            query_result: observed,
        })
    }
}

/// Every expected row must appear verbatim somewhere in the actual result
#[derive(Debug, Clone)]
pub struct SubsetMatch {
    expected: Vec<Row>,
}

impl SubsetMatch {
    pub fn new(expected: Vec<Row>) -> Self {
        Self { expected }
    }
}

impl AssertionStrategy for SubsetMatch {
    fn name(&self) -> &'static str {
        "subset_match"
    }

    fn expected_rows(&self) -> Vec<Row> {
        self.expected.clone()
    }

    fn assert(&mut self, actual: &mut QueryResult, fetch_size: usize) -> Result<QueryAssertionResult> {
        let mut driver = PageDriver::new(actual, fetch_size);
        let (unmatched, observed) = retire_verbatim(&mut driver, &self.expected)?;
        debug!(
            expected = self.expected.len(),
            unmatched = unmatched.len(),
            fetches = driver.fetch_count(),
            "subset match"
        );
        Ok(QueryAssertionResult {
            errors: unmatched.into_iter().map(Discrepancy::Row).collect(),
            not_found_rows: Vec::new(),
            query_result: observed,
        })
    }
}

type PredicateFn = dyn Fn(&[Row]) -> std::result::Result<(), String>;

/// A caller-supplied predicate judges the whole materialized result
pub struct PredicateMatch {
    predicate: Box<PredicateFn>,
    expected: Vec<Row>,
}

impl PredicateMatch {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&[Row]) -> std::result::Result<(), String> + 'static,
    {
        Self {
            predicate: Box::new(predicate),
            expected: Vec::new(),
        }
    }

    /// Use one of the declarative predicates
    pub fn builtin(predicate: Predicate) -> Self {
        Self::new(move |rows| predicate.check(rows))
    }

    /// Rows to show as the expectation in reports
    pub fn with_expected(mut self, expected: Vec<Row>) -> Self {
        self.expected = expected;
        self
    }
}

impl std::fmt::Debug for PredicateMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateMatch")
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

impl AssertionStrategy for PredicateMatch {
    fn name(&self) -> &'static str {
        "predicate_match"
    }

    fn expected_rows(&self) -> Vec<Row> {
        self.expected.clone()
    }

    fn assert(&mut self, actual: &mut QueryResult, fetch_size: usize) -> Result<QueryAssertionResult> {
        let mut driver = PageDriver::new(actual, fetch_size);
        let mut rows = Vec::new();
        while let Some(page) = driver.next_page()? {
            rows.extend(page);
        }

        let errors = match (self.predicate)(&rows) {
            Ok(()) => Vec::new(),
            Err(detail) => vec![Discrepancy::Predicate { detail }],
        };
        Ok(QueryAssertionResult {
            errors,
            not_found_rows: Vec::new(),
            query_result: rows,
        })
    }
}

/// Subset match by identifier column with field-level diffs
#[derive(Debug, Clone)]
pub struct DeepSubsetMatch {
    column_name: String,
    expected: Vec<Row>,
    complete_expected_row: bool,
}

impl DeepSubsetMatch {
    pub fn new(column_name: impl Into<String>, expected: Vec<Row>) -> Self {
        Self {
            column_name: column_name.into(),
            expected,
            complete_expected_row: false,
        }
    }

    /// Treat actual-only columns as implied by the expected row
    pub fn complete_expected_rows(mut self, complete: bool) -> Self {
        self.complete_expected_row = complete;
        self
    }
}

impl AssertionStrategy for DeepSubsetMatch {
    fn name(&self) -> &'static str {
        "deep_subset_match"
    }

    fn validate(&self) -> Result<()> {
        if self.column_name.is_empty() {
            return Err(Error::MissingColumnName(self.name().to_string()));
        }
        require_identifier(&self.column_name, &self.expected)
    }

    fn expected_rows(&self) -> Vec<Row> {
        self.expected.clone()
    }

    fn assert(&mut self, actual: &mut QueryResult, fetch_size: usize) -> Result<QueryAssertionResult> {
        let mut reconciler = Reconciler::new(self.column_name.as_str(), false)
            .complete_expected_rows(self.complete_expected_row);
        reconciler.offer_expected(self.expected.iter().cloned());

        let mut driver = PageDriver::new(actual, fetch_size);
        while let Some(page) = driver.next_page()? {
            reconciler.offer_actual(page);
            reconciler.reconcile()?;
        }

        let (result, _) = reconciler.finish();
        Ok(result)
    }
}

/// Deep-subset comparison where the expectation is itself a live query
#[derive(Debug)]
pub struct ResultComparator {
    column_name: String,
    expected: QueryResult,
    observed_expected: Vec<Row>,
    complete_expected_row: bool,
}

impl ResultComparator {
    pub fn new(column_name: impl Into<String>, expected: QueryResult) -> Self {
        Self {
            column_name: column_name.into(),
            expected,
            observed_expected: Vec::new(),
            complete_expected_row: false,
        }
    }

    pub fn complete_expected_rows(mut self, complete: bool) -> Self {
        self.complete_expected_row = complete;
        self
    }

    /// The expectation's query result
    pub fn expected_query(&self) -> &QueryResult {
        &self.expected
    }
}

impl AssertionStrategy for ResultComparator {
    fn name(&self) -> &'static str {
        "query_result_comparator"
    }

    fn validate(&self) -> Result<()> {
        if self.column_name.is_empty() {
            return Err(Error::MissingColumnName(self.name().to_string()));
        }
        Ok(())
    }

    fn expectation_error(&self) -> Option<&str> {
        if self.expected.has_error() {
            self.expected.error_message.as_deref()
        } else {
            None
        }
    }

    fn expected_rows(&self) -> Vec<Row> {
        self.observed_expected.clone()
    }

    fn assert(&mut self, actual: &mut QueryResult, fetch_size: usize) -> Result<QueryAssertionResult> {
        let mut reconciler = Reconciler::new(self.column_name.as_str(), true)
            .complete_expected_rows(self.complete_expected_row);

        let mut expected_pages = PageDriver::new(&mut self.expected, fetch_size);
        let mut actual_pages = PageDriver::new(actual, fetch_size);

        // both sides must run dry before we stop
        loop {
            let expected_page = expected_pages.next_page()?;
            let actual_page = actual_pages.next_page()?;
            if expected_page.is_none() && actual_page.is_none() {
                break;
            }
            if let Some(page) = expected_page {
                reconciler.offer_expected(page);
            }
            if let Some(page) = actual_page {
                reconciler.offer_actual(page);
            }
            reconciler.reconcile()?;
        }

        debug!(
            expected_fetches = expected_pages.fetch_count(),
            actual_fetches = actual_pages.fetch_count(),
            "co-drained result sets"
        );
        let (result, observed_expected) = reconciler.finish();
        self.observed_expected = observed_expected;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_exact_match_reports_both_sides() {
        let mut actual = QueryResult::from_rows(
            "q",
            vec![Row::new().with("id", 1), Row::new().with("id", 3), Row::new().with("id", 3)],
        );
        let mut strategy =
            ExactMatch::new(vec![Row::new().with("id", 1), Row::new().with("id", 2), Row::new().with("id", 3)]);
        let result = strategy.assert(&mut actual, 2).unwrap();
        assert_eq!(
            result.errors,
            vec![
                Discrepancy::Unexpected(Row::new().with("id", 3)),
                Discrepancy::Missing(Row::new().with("id", 2)),
            ]
        );
    }

    #[test]
    fn test_exact_match_normalizes_decimals() {
        let mut actual = QueryResult::from_rows(
            "q",
            vec![Row::new().with("total", Value::decimal("10.00").unwrap())],
        );
        let mut strategy = ExactMatch::new(vec![Row::new().with("total", 10)]);
        assert!(strategy.assert(&mut actual, 10).unwrap().is_match());
    }

    #[test]
    fn test_predicate_failure_is_single_error() {
        let mut actual = QueryResult::from_rows("q", vec![Row::new().with("id", 1)]);
        let mut strategy = PredicateMatch::new(|rows| {
            if rows.len() == 2 {
                Ok(())
            } else {
                Err(format!("wanted 2 rows, got {}", rows.len()))
            }
        });
        let result = strategy.assert(&mut actual, 10).unwrap();
        assert_eq!(
            result.errors,
            vec![Discrepancy::Predicate { detail: "wanted 2 rows, got 1".into() }]
        );
        assert_eq!(result.query_result.len(), 1);
    }

    #[test]
    fn test_predicate_success_has_no_errors() {
        let mut actual = QueryResult::from_rows("q", vec![Row::new().with("id", 1)]);
        let mut strategy = PredicateMatch::builtin(Predicate::NotNull { column: "id".into() });
        assert!(strategy.assert(&mut actual, 10).unwrap().is_match());
    }

    #[test]
    fn test_deep_subset_validation() {
        let strategy = DeepSubsetMatch::new("id", vec![Row::new().with("name", "A")]);
        assert!(matches!(strategy.validate(), Err(Error::MissingIdentifier { .. })));
        let strategy = DeepSubsetMatch::new("", vec![]);
        assert!(matches!(strategy.validate(), Err(Error::MissingColumnName(_))));
    }

    #[test]
    fn test_comparator_reports_expectation_error() {
        let expected = QueryResult::failed("exp", "SELECT", Default::default(), "no such table");
        let strategy = ResultComparator::new("id", expected);
        assert_eq!(strategy.expectation_error(), Some("no such table"));
    }
}
