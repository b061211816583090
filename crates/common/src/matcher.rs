//! Locating the actual row that corresponds to an expected row

use crate::error::{Error, Result};
use crate::value::{Row, Value};

/// Find the candidate whose `id_column` equals the expected row's value.
///
/// Returns the index of the first such candidate in slice order, which for
/// paged results is page-arrival order. Candidates lacking the column never
/// match. An expected row without the column is a caller error.
pub fn find_by_id(id_column: &str, expected_row: &Row, candidates: &[Row]) -> Result<Option<usize>> {
    let id = identifier(id_column, expected_row)?;
    Ok(candidates.iter().position(|row| row.has_pair(id_column, id)))
}

/// The expected row's identifier value; its absence is a caller error
pub fn identifier<'r>(id_column: &str, expected_row: &'r Row) -> Result<&'r Value> {
    expected_row
        .get(id_column)
        .ok_or_else(|| Error::MissingIdentifier {
            column: id_column.to_string(),
            row: expected_row.clone(),
        })
}

/// Check that every expected row carries the identifier column
pub fn require_identifier(id_column: &str, expected_rows: &[Row]) -> Result<()> {
    match expected_rows.iter().find(|row| !row.contains(id_column)) {
        Some(row) => Err(Error::MissingIdentifier {
            column: id_column.to_string(),
            row: row.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<Row> {
        vec![
            Row::new().with("id", 1).with("name", "A"),
            Row::new().with("name", "no id"),
            Row::new().with("id", 2).with("name", "B"),
            Row::new().with("id", 2).with("name", "B2"),
        ]
    }

    #[test]
    fn test_finds_matching_id() {
        let expected = Row::new().with("id", 1).with("name", "changed");
        assert_eq!(find_by_id("id", &expected, &candidates()).unwrap(), Some(0));
    }

    #[test]
    fn test_duplicate_ids_resolve_to_first() {
        let expected = Row::new().with("id", 2);
        assert_eq!(find_by_id("id", &expected, &candidates()).unwrap(), Some(2));
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let expected = Row::new().with("id", 9);
        assert_eq!(find_by_id("id", &expected, &candidates()).unwrap(), None);
    }

    #[test]
    fn test_missing_identifier_is_caller_error() {
        let expected = Row::new().with("name", "A");
        let err = find_by_id("id", &expected, &candidates()).unwrap_err();
        assert!(matches!(err, Error::MissingIdentifier { ref column, .. } if column == "id"));
        assert!(err.is_caller_misuse());
        assert!(require_identifier("id", &[expected]).is_err());
    }
}
