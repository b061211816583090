//! Assertions against real SQLite query results

use lighttest_common::{
    AssertionOptions, AssertionStrategy, DeepSubsetMatch, Discrepancy, ExactMatch, QueryAsserter,
    ResultComparator, Row, SubsetMatch, Value, Verdict,
};
use lighttest_sql::{Database, SqlConnection, SqlError};

fn fixture() -> SqlConnection {
    let db = Database::open_memory().unwrap();
    db.execute_batch(
        r#"
        CREATE TABLE orders (id INTEGER PRIMARY KEY, customer TEXT NOT NULL, total DECIMAL(10,2));
        INSERT INTO orders VALUES (1, 'ada', '19.99');
        INSERT INTO orders VALUES (2, 'bob', '5.50');
        INSERT INTO orders VALUES (3, 'cyd', '120.00');
        CREATE TABLE orders_archive (id INTEGER PRIMARY KEY, customer TEXT NOT NULL, total DECIMAL(10,2));
        INSERT INTO orders_archive VALUES (1, 'ada', '19.99');
        INSERT INTO orders_archive VALUES (2, 'bobby', '5.50');
        INSERT INTO orders_archive VALUES (4, 'dan', '1.00');
        "#,
    )
    .unwrap();
    SqlConnection::new(db)
}

#[test]
fn decimal_columns_surface_as_decimals() {
    let conn = fixture();
    let mut result = conn.query_by_text("SELECT id, total FROM orders WHERE id = 1", "one");
    assert!(!result.has_error());
    let rows = result.fetch_all(10).unwrap();
    assert!(matches!(rows[0].get("total"), Some(Value::Decimal(_))));
}

#[test]
fn exact_match_against_sqlite_normalizes_decimals() {
    let conn = fixture();
    let mut actual = conn.query_by_text("SELECT id, customer, total FROM orders", "all-orders");
    let mut strategy = ExactMatch::new(vec![
        Row::new().with("id", 3).with("customer", "cyd").with("total", 120),
        Row::new().with("id", 1).with("customer", "ada").with("total", 19),
        Row::new().with("id", 2).with("customer", "bob").with("total", 5),
    ]);

    let outcome = QueryAsserter::default()
        .run(&mut strategy, &mut actual, &AssertionOptions::default().performance_limit(30.0))
        .unwrap();
    assert_eq!(outcome.verdict(), Verdict::Successful, "{:?}", outcome.assertion.errors);
}

#[test]
fn select_by_params_binds_values() {
    let conn = fixture();
    let mut actual = conn
        .select_by_params(
            "orders",
            &["id", "customer"],
            "customer",
            &[Value::from("ada"), Value::from("cyd")],
            "by-customer",
        )
        .unwrap();
    assert_eq!(actual.query, "SELECT id, customer FROM orders WHERE customer IN (?1, ?2)");

    let mut strategy = SubsetMatch::new(vec![Row::new().with("id", 3).with("customer", "cyd")]);
    let result = strategy.assert(&mut actual, 1).unwrap();
    assert!(result.is_match());
    assert_eq!(result.query_result.len(), 2);
}

#[test]
fn select_by_params_rejects_bad_identifiers() {
    let conn = fixture();
    let err = conn
        .select_by_params("orders; --", &[], "id", &[Value::from(1)], "bad")
        .unwrap_err();
    assert!(matches!(err, SqlError::InvalidIdentifier(_)));
}

#[test]
fn failing_query_is_classified_without_panicking() {
    let conn = fixture();
    let mut actual = conn.query_by_text("SELECT * FROM no_such_table", "missing-table");
    assert!(actual.has_error());

    let mut strategy = DeepSubsetMatch::new("id", vec![Row::new().with("id", 1)]);
    let outcome = QueryAsserter::default()
        .run(&mut strategy, &mut actual, &AssertionOptions::default())
        .unwrap();
    assert_eq!(outcome.verdict(), Verdict::Failed);
    assert!(matches!(
        outcome.assertion.errors.as_slice(),
        [Discrepancy::QueryFailed { alias, .. }] if alias == "missing-table"
    ));
}

#[test]
fn comparator_between_two_tables() {
    let conn = fixture();
    let mut actual = conn.query_by_text("SELECT id, customer, total FROM orders ORDER BY id", "live");
    let expected = conn.query_by_text(
        "SELECT id, customer, total FROM orders_archive ORDER BY id",
        "archive",
    );
    let mut strategy = ResultComparator::new("id", expected);

    let outcome = QueryAsserter::default()
        .run(
            &mut strategy,
            &mut actual,
            &AssertionOptions::default().fetch_size(2).performance_limit(30.0),
        )
        .unwrap();

    let diffs: Vec<_> = outcome.assertion.diffs().collect();
    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].error_in_row, Row::new().with("customer", "bobby"));
    assert_eq!(
        outcome.assertion.not_found_rows,
        vec![Row::new().with("id", 4).with("customer", "dan").with("total", 1)]
    );
    assert_eq!(outcome.verdict(), Verdict::Failed);
    assert_eq!(outcome.report.expected_result.len(), 3);
}
