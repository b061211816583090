//! Field-level comparison of a matched expected/actual row pair

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::value::{Row, Value};

/// Sentinel reported when an expected row has no counterpart
pub const MATCH_NOT_FOUND: &str = "Match not found!";

/// Which row a diff record is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffId {
    /// Identifier column and the value both rows share
    Matched { column: String, value: Value },
    NotFound,
}

impl DiffId {
    pub fn value(&self) -> Option<&Value> {
        match self {
            DiffId::Matched { value, .. } => Some(value),
            DiffId::NotFound => None,
        }
    }
}

impl Serialize for DiffId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DiffId::Matched { column, value } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(column, value)?;
                map.end()
            }
            DiffId::NotFound => serializer.serialize_str(MATCH_NOT_FOUND),
        }
    }
}

/// Structured difference between an expected row and its actual counterpart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRecord {
    /// Expected (column, value) pairs the actual row does not hold
    pub error_in_row: Row,
    pub id: DiffId,
    /// Actual (column, value) pairs absent from the effective expected row
    #[serde(skip_serializing_if = "Row::is_empty")]
    pub actual_data: Row,
}

/// Options steering [`compare_rows`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CompareOptions {
    /// Emit nothing for a missing actual row; the caller tracks it instead
    pub skip_empty_row: bool,
    /// Back-fill columns missing from the expected row with the actual
    /// row's values before collecting `actual_data`
    pub complete_expected_row: bool,
}

/// Compare an expected row against its (possibly missing) actual row.
///
/// Returns `None` when the rows agree on every expected field, or when the
/// actual row is missing and `skip_empty_row` is set. Mismatches are data and
/// never an error.
pub fn compare_rows(
    expected_row: &Row,
    actual_row: Option<&Row>,
    id_column: &str,
    options: CompareOptions,
) -> Option<DiffRecord> {
    let Some(actual_row) = actual_row else {
        if options.skip_empty_row {
            return None;
        }
        return Some(DiffRecord {
            error_in_row: expected_row.clone(),
            id: DiffId::NotFound,
            actual_data: Row::new(),
        });
    };

    let differing: Row = expected_row
        .iter()
        .filter(|(column, value)| !actual_row.has_pair(column, value))
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect();

    if differing.is_empty() {
        return None;
    }

    let effective_expected = if options.complete_expected_row {
        let mut completed = actual_row.clone();
        for (column, value) in expected_row.iter() {
            completed.insert(column, value.clone());
        }
        completed
    } else {
        expected_row.clone()
    };

    let actual_data: Row = actual_row
        .iter()
        .filter(|(column, value)| !effective_expected.has_pair(column, value))
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect();

    let id = match actual_row.get(id_column) {
        Some(value) => DiffId::Matched {
            column: id_column.to_string(),
            value: value.clone(),
        },
        None => DiffId::NotFound,
    };

    Some(DiffRecord {
        error_in_row: differing,
        id,
        actual_data,
    })
}
