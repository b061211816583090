//! Declarative YAML suite specification

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use lighttest_common::{
    AssertionOptions, AssertionStrategy, DeepSubsetMatch, Error as AssertionError, ExactMatch,
    Predicate, PredicateMatch, ResultComparator, Row, SubsetMatch, Value,
};
use lighttest_sql::SqlConnection;

use crate::error::{RunnerError, RunnerResult};

/// A suite of query assertions parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSpec {
    /// Unique name for this suite
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering suites
    #[serde(default)]
    pub tags: Vec<String>,

    /// SQLite database file; in-memory when absent
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// SQL batches run before the first step
    #[serde(default)]
    pub setup: Vec<String>,

    /// Suite-wide option overrides
    #[serde(default)]
    pub defaults: AssertionOptions,

    /// Steps to execute in order
    pub steps: Vec<StepSpec>,
}

/// One query plus the assertion made about its result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Name of the query in reports
    pub alias: String,

    /// Query text
    #[serde(default)]
    pub query: Option<String>,

    /// Parameterised `SELECT ... WHERE column IN (...)`
    #[serde(default)]
    pub select: Option<SelectSpec>,

    /// What to check
    pub assert: AssertSpec,

    /// Step-level option overrides
    #[serde(flatten)]
    pub options: AssertionOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectSpec {
    pub table: String,
    #[serde(default)]
    pub columns: Vec<String>,
    pub filter_column: String,
    pub params: Vec<Value>,
}

/// The assertion of a step, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssertSpec {
    /// Same rows, any order
    Exact {
        #[serde(default)]
        expected: Option<Vec<Row>>,
    },

    /// Expected rows appear verbatim
    Subset {
        #[serde(default)]
        expected: Option<Vec<Row>>,
    },

    /// A built-in predicate over all rows
    Predicate { predicate: Predicate },

    /// Identifier match with field-level diffs
    DeepSubset {
        #[serde(default)]
        column: Option<String>,
        #[serde(default)]
        expected: Option<Vec<Row>>,
        #[serde(default)]
        complete_expected_row: bool,
    },

    /// Compare with the result of another query
    Compare {
        #[serde(default)]
        column: Option<String>,
        #[serde(default)]
        expected_query: Option<String>,
        #[serde(default)]
        complete_expected_row: bool,
    },
}

impl AssertSpec {
    /// Strategy name this assertion maps to
    pub fn kind(&self) -> &'static str {
        match self {
            AssertSpec::Exact { .. } => "exact_match",
            AssertSpec::Subset { .. } => "subset_match",
            AssertSpec::Predicate { .. } => "predicate_match",
            AssertSpec::DeepSubset { .. } => "deep_subset_match",
            AssertSpec::Compare { .. } => "query_result_comparator",
        }
    }

    /// Build the strategy. A comparison runs its expectation query on `conn`.
    pub fn build(
        &self,
        conn: &SqlConnection,
        alias: &str,
    ) -> RunnerResult<Box<dyn AssertionStrategy>> {
        let kind = self.kind();
        let expected = |rows: &Option<Vec<Row>>| {
            rows.clone()
                .ok_or_else(|| AssertionError::MissingExpectedResult(kind.to_string()))
        };
        let column = |column: &Option<String>| {
            column
                .clone()
                .filter(|c| !c.is_empty())
                .ok_or_else(|| AssertionError::MissingColumnName(kind.to_string()))
        };

        let strategy: Box<dyn AssertionStrategy> = match self {
            AssertSpec::Exact { expected: rows } => Box::new(ExactMatch::new(expected(rows)?)),
            AssertSpec::Subset { expected: rows } => Box::new(SubsetMatch::new(expected(rows)?)),
            AssertSpec::Predicate { predicate } => {
                Box::new(PredicateMatch::builtin(predicate.clone()))
            }
            AssertSpec::DeepSubset {
                column: id,
                expected: rows,
                complete_expected_row,
            } => Box::new(
                DeepSubsetMatch::new(column(id)?, expected(rows)?)
                    .complete_expected_rows(*complete_expected_row),
            ),
            AssertSpec::Compare {
                column: id,
                expected_query,
                complete_expected_row,
            } => {
                let id = column(id)?;
                let query = expected_query
                    .as_deref()
                    .ok_or_else(|| AssertionError::MissingExpectedResult(kind.to_string()))?;
                let expected = conn.query_by_text(query, &format!("{}:expected", alias));
                Box::new(
                    ResultComparator::new(id, expected)
                        .complete_expected_rows(*complete_expected_row),
                )
            }
        };
        Ok(strategy)
    }
}

impl StepSpec {
    /// Reject steps with no query or with two
    pub fn validate(&self) -> RunnerResult<()> {
        match (&self.query, &self.select) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (None, None) => Err(RunnerError::InvalidStep {
                step: self.alias.clone(),
                reason: "needs either `query` or `select`".to_string(),
            }),
            (Some(_), Some(_)) => Err(RunnerError::InvalidStep {
                step: self.alias.clone(),
                reason: "`query` and `select` are mutually exclusive".to_string(),
            }),
        }
    }
}

impl SuiteSpec {
    /// Parse a suite from YAML string
    pub fn from_yaml(yaml: &str) -> RunnerResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        for step in &spec.steps {
            step.validate()?;
        }
        Ok(spec)
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> RunnerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| RunnerError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load one suite file, or every YAML suite under a directory
    pub fn load_all(path: &Path) -> RunnerResult<Vec<Self>> {
        if path.is_file() {
            return Ok(vec![Self::from_file(path)?]);
        }
        if !path.exists() {
            return Err(RunnerError::NotFound(path.display().to_string()));
        }

        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        files.sort();

        files.iter().map(|f| Self::from_file(f)).collect()
    }

    /// Filter suites by tag
    pub fn filter_by_tag(specs: Vec<Self>, tag: &str) -> Vec<Self> {
        specs
            .into_iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lighttest_common::Positivity;

    #[test]
    fn test_parse_suite() {
        let yaml = r#"
name: orders-smoke
description: Orders land in the table
tags: [orders, smoke]
setup:
  - CREATE TABLE orders (id INTEGER, customer TEXT);
defaults:
  performance_limit_in_seconds: 2
steps:
  - alias: all-orders
    query: SELECT id, customer FROM orders
    positivity: negative
    critical_step: true
    fetch_size: 10
    assert:
      kind: deep_subset
      column: id
      expected:
        - { id: 1, customer: ada }
  - alias: ada-only
    select:
      table: orders
      filter_column: customer
      params: [ada]
    assert:
      kind: predicate
      predicate: { check: row_count, equals: 1 }
"#;
        let spec = SuiteSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.name, "orders-smoke");
        assert_eq!(spec.defaults.performance_limit_in_seconds, Some(2.0));

        let first = &spec.steps[0];
        assert_eq!(first.options.positivity, Some(Positivity::Negative));
        assert_eq!(first.options.critical_step, Some(true));
        assert_eq!(first.options.fetch_size, Some(10));
        assert_eq!(first.assert.kind(), "deep_subset_match");

        let second = &spec.steps[1];
        assert!(second.select.is_some());
        assert_eq!(second.assert.kind(), "predicate_match");
    }

    #[test]
    fn test_step_needs_exactly_one_query() {
        let yaml = r#"
name: broken
steps:
  - alias: nothing
    assert: { kind: exact, expected: [] }
"#;
        assert!(matches!(
            SuiteSpec::from_yaml(yaml),
            Err(RunnerError::InvalidStep { .. })
        ));
    }

    #[test]
    fn test_missing_expected_is_caller_error() {
        let conn = SqlConnection::new(lighttest_sql::Database::open_memory().unwrap());
        let spec = AssertSpec::Subset { expected: None };
        let err = spec.build(&conn, "x").err().unwrap();
        assert!(matches!(
            err,
            RunnerError::Assertion(AssertionError::MissingExpectedResult(_))
        ));

        let spec = AssertSpec::DeepSubset {
            column: None,
            expected: Some(vec![]),
            complete_expected_row: false,
        };
        assert!(matches!(
            spec.build(&conn, "x").err().unwrap(),
            RunnerError::Assertion(AssertionError::MissingColumnName(_))
        ));
    }
}
