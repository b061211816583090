//! Strategy behaviour across page boundaries
//!
//! Exercises the strategies end to end through in-memory result sets with
//! varying fetch sizes.

use std::collections::HashSet;

use lighttest_common::{
    AssertionStrategy, DeepSubsetMatch, DiffId, Discrepancy, ExactMatch, QueryResult,
    ResultComparator, Row, SubsetMatch, Value,
};
use test_case::test_case;

fn product(id: i64, name: &str, price: &str) -> Row {
    Row::new()
        .with("id", id)
        .with("name", name)
        .with("price", Value::decimal(price).unwrap())
}

fn catalogue() -> Vec<Row> {
    (1..=25)
        .map(|i| product(i, &format!("item-{}", i), &format!("{}.99", i)))
        .collect()
}

fn diff_ids(errors: &[Discrepancy]) -> HashSet<Value> {
    errors
        .iter()
        .filter_map(Discrepancy::as_diff)
        .filter_map(|d| d.id.value().cloned())
        .collect()
}

fn ids(rows: &[Row]) -> HashSet<Value> {
    rows.iter().filter_map(|r| r.get("id").cloned()).collect()
}

#[test]
fn exact_match_ignores_order() {
    let mut shuffled = catalogue();
    shuffled.reverse();
    let mut actual = QueryResult::from_rows("catalogue", shuffled);

    let mut strategy = ExactMatch::new(catalogue());
    let result = strategy.assert(&mut actual, 7).unwrap();
    assert!(result.errors.is_empty());
    assert_eq!(result.query_result.len(), 25);
}

#[test_case(1 ; "one row per page")]
#[test_case(4 ; "pages split expected rows")]
#[test_case(1000 ; "single page")]
fn subset_match_is_independent_of_fetch_size(fetch_size: usize) {
    let mut actual = QueryResult::from_rows("catalogue", catalogue());
    let expected = vec![
        Row::new().with("id", 3).with("name", "item-3").with("price", 3),
        Row::new().with("id", 24).with("name", "item-24").with("price", 24),
        Row::new().with("id", 99).with("name", "ghost").with("price", 0),
    ];

    let mut strategy = SubsetMatch::new(expected);
    let result = strategy.assert(&mut actual, fetch_size).unwrap();

    assert_eq!(
        result.errors,
        vec![Discrepancy::Row(Row::new().with("id", 99).with("name", "ghost").with("price", 0))]
    );
    assert!(result.not_found_rows.is_empty());
    assert_eq!(result.query_result.len(), 25);
}

#[test]
fn deep_subset_reports_field_diff_and_missing_rows() {
    let mut actual = QueryResult::from_rows(
        "users",
        vec![
            Row::new().with("id", 1).with("name", "B"),
            Row::new().with("id", 2).with("name", "C"),
        ],
    );
    let mut strategy = DeepSubsetMatch::new(
        "id",
        vec![
            Row::new().with("id", 1).with("name", "A"),
            Row::new().with("id", 7).with("name", "Z"),
        ],
    );

    let result = strategy.assert(&mut actual, 1).unwrap();

    let diffs: Vec<_> = result.diffs().collect();
    assert_eq!(diffs.len(), 1);
    assert_eq!(
        diffs[0].id,
        DiffId::Matched { column: "id".into(), value: Value::Int(1) }
    );
    assert_eq!(diffs[0].error_in_row, Row::new().with("name", "A"));
    assert_eq!(result.not_found_rows, vec![Row::new().with("id", 7).with("name", "Z")]);
}

#[test_case(1 ; "tiny pages")]
#[test_case(3 ; "small pages")]
#[test_case(1000 ; "one page")]
fn deep_subset_never_double_counts(fetch_size: usize) {
    let mut actual = QueryResult::from_rows("catalogue", catalogue());
    let mut expected: Vec<Row> = vec![
        product(2, "item-2", "2.10"),
        product(20, "renamed", "20.50"),
        product(40, "missing", "1"),
    ];
    expected.push(Row::new().with("id", 41));

    let mut strategy = DeepSubsetMatch::new("id", expected);
    let result = strategy.assert(&mut actual, fetch_size).unwrap();

    let differing = diff_ids(&result.errors);
    let missing = ids(&result.not_found_rows);
    assert_eq!(differing, HashSet::from([Value::Int(20)]));
    assert_eq!(missing, HashSet::from([Value::Int(40), Value::Int(41)]));
    assert!(differing.is_disjoint(&missing));
    // only rows that came out of the cursor
    assert!(ids(&result.query_result).is_subset(&ids(&catalogue())));
}

#[test]
fn deep_subset_matches_rows_arriving_on_later_pages() {
    let mut actual = QueryResult::from_rows("catalogue", catalogue());
    let mut strategy = DeepSubsetMatch::new("id", vec![product(25, "item-25", "25.00")]);
    let result = strategy.assert(&mut actual, 2).unwrap();
    assert!(result.is_match());
}

fn left() -> Vec<Row> {
    vec![
        Row::new().with("id", 1).with("qty", 5),
        Row::new().with("id", 2).with("qty", 6),
        Row::new().with("id", 3).with("qty", 7),
        Row::new().with("id", 4).with("qty", 8),
    ]
}

fn right() -> Vec<Row> {
    vec![
        Row::new().with("id", 4).with("qty", 8),
        Row::new().with("id", 3).with("qty", 70),
        Row::new().with("id", 1).with("qty", 50),
        Row::new().with("id", 2).with("qty", 6),
    ]
}

#[test_case(1 ; "row by row")]
#[test_case(3 ; "misaligned pages")]
#[test_case(1000 ; "one page")]
fn comparator_is_symmetric(fetch_size: usize) {
    let mut a = QueryResult::from_rows("a", left());
    let mut ab = ResultComparator::new("id", QueryResult::from_rows("b", right()));
    let forward = ab.assert(&mut a, fetch_size).unwrap();

    let mut b = QueryResult::from_rows("b", right());
    let mut ba = ResultComparator::new("id", QueryResult::from_rows("a", left()));
    let backward = ba.assert(&mut b, fetch_size).unwrap();

    let expected = HashSet::from([Value::Int(1), Value::Int(3)]);
    assert_eq!(diff_ids(&forward.errors), expected);
    assert_eq!(diff_ids(&backward.errors), expected);
    assert!(forward.not_found_rows.is_empty());
    assert!(backward.not_found_rows.is_empty());
    assert_eq!(ab.expected_rows().len(), 4);
}

#[test]
fn comparator_handles_uneven_lengths() {
    let mut actual = QueryResult::from_rows("actual", left());
    let mut expected_rows = right();
    expected_rows.push(Row::new().with("id", 9).with("qty", 1));
    let mut strategy = ResultComparator::new("id", QueryResult::from_rows("expected", expected_rows));

    let result = strategy.assert(&mut actual, 2).unwrap();
    assert_eq!(result.not_found_rows, vec![Row::new().with("id", 9).with("qty", 1)]);
    assert_eq!(result.query_result.len(), 4);
}
