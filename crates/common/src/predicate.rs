//! Built-in predicates over a fully materialized result

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::value::Row;

/// Declarative checks usable from suite files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Predicate {
    /// Number of rows, bounded from either side
    RowCount {
        #[serde(default)]
        equals: Option<usize>,
        #[serde(default)]
        at_least: Option<usize>,
        #[serde(default)]
        at_most: Option<usize>,
    },
    /// Every row has a non-null value in `column`
    NotNull { column: String },
    /// No two rows share a value in `column`
    Unique { column: String },
}

impl Predicate {
    /// Evaluate against the rows; `Err` carries the failure detail
    pub fn check(&self, rows: &[Row]) -> Result<(), String> {
        match self {
            Predicate::RowCount { equals, at_least, at_most } => {
                let n = rows.len();
                if let Some(expected) = equals {
                    if n != *expected {
                        return Err(format!("expected exactly {} rows, got {}", expected, n));
                    }
                }
                if let Some(min) = at_least {
                    if n < *min {
                        return Err(format!("expected at least {} rows, got {}", min, n));
                    }
                }
                if let Some(max) = at_most {
                    if n > *max {
                        return Err(format!("expected at most {} rows, got {}", max, n));
                    }
                }
                Ok(())
            }
            Predicate::NotNull { column } => {
                let offenders = rows
                    .iter()
                    .filter(|row| row.get(column).map_or(true, |v| v.is_null()))
                    .count();
                if offenders > 0 {
                    Err(format!("{} row(s) have NULL or missing '{}'", offenders, column))
                } else {
                    Ok(())
                }
            }
            Predicate::Unique { column } => {
                let mut seen = HashSet::new();
                for row in rows {
                    let Some(value) = row.get(column) else {
                        continue;
                    };
                    if !seen.insert(value) {
                        return Err(format!("duplicate value {} in column '{}'", value, column));
                    }
                }
                Ok(())
            }
        }
    }
}
