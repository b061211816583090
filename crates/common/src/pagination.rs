//! Page-by-page draining of result sets
//!
//! [`PageDriver`] pulls normalized pages until an empty page comes back; that
//! is the only termination signal a cursor gives. [`Reconciler`] holds the
//! working sets of the match-as-you-go strategies: expected rows not matched
//! yet, and actual rows not claimed yet. Both roll forward across pages.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace};

use crate::compare::{compare_rows, CompareOptions};
use crate::error::Result;
use crate::matcher::identifier;
use crate::result::{Discrepancy, QueryAssertionResult};
use crate::resultset::ResultSet;
use crate::value::{normalize, Row, RowKey, Value};

/// Default page size when draining a cursor
pub const DEFAULT_FETCH_SIZE: usize = 1000;

/// Drains one result set in pages of `fetch_size`
pub struct PageDriver<'a, R: ResultSet + ?Sized> {
    source: &'a mut R,
    fetch_size: usize,
    fetches: usize,
    rows_seen: usize,
    exhausted: bool,
}

impl<'a, R: ResultSet + ?Sized> PageDriver<'a, R> {
    pub fn new(source: &'a mut R, fetch_size: usize) -> Self {
        Self {
            source,
            fetch_size,
            fetches: 0,
            rows_seen: 0,
            exhausted: false,
        }
    }

    /// Next non-empty page, normalized. `None` once the cursor returned an
    /// empty page; no fetch is issued after that.
    pub fn next_page(&mut self) -> Result<Option<Vec<Row>>> {
        if self.exhausted {
            return Ok(None);
        }
        let page = self.source.fetch_page(self.fetch_size)?;
        self.fetches += 1;
        if page.is_empty() {
            self.exhausted = true;
            debug!(fetches = self.fetches, rows = self.rows_seen, "result set exhausted");
            return Ok(None);
        }
        self.rows_seen += page.len();
        trace!(page = self.fetches, rows = page.len(), "page fetched");
        Ok(Some(page.iter().map(normalize).collect()))
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Number of `fetch_page` calls issued so far
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }
}

/// Multiset of rows keyed by their canonical form
#[derive(Debug, Default)]
pub(crate) struct RowBag {
    counts: HashMap<RowKey, usize>,
}

impl RowBag {
    pub(crate) fn insert(&mut self, row: &Row) {
        *self.counts.entry(row.key()).or_insert(0) += 1;
    }

    /// Remove one occurrence; returns whether one was present
    pub(crate) fn take(&mut self, row: &Row) -> bool {
        let key = row.key();
        match self.counts.get_mut(&key) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.counts.remove(&key);
                true
            }
            None => false,
        }
    }
}

/// Accumulate-all shape: retire expected rows that appear verbatim in any
/// page until the cursor is exhausted. Each actual row retires at most one
/// expected occurrence. Returns `(unmatched expected, observed actual)`.
pub fn retire_verbatim<R: ResultSet + ?Sized>(
    driver: &mut PageDriver<'_, R>,
    expected: &[Row],
) -> Result<(Vec<Row>, Vec<Row>)> {
    let mut remaining = RowBag::default();
    let expected: Vec<Row> = expected.iter().map(normalize).collect();
    for row in &expected {
        remaining.insert(row);
    }

    let mut observed = Vec::new();
    while let Some(page) = driver.next_page()? {
        for row in &page {
            remaining.take(row);
        }
        observed.extend(page);
    }

    // whatever is still in the bag, in the order the author listed it
    let mut unmatched = Vec::new();
    for row in expected {
        if remaining.take(&row) {
            unmatched.push(row);
        }
    }
    Ok((unmatched, observed))
}

/// Unclaimed actual rows in arrival order, indexed by canonical form and by
/// identifier. Claimed slots become `None`; index queues skip them lazily.
#[derive(Debug, Default)]
struct PendingRows {
    slots: Vec<Option<Row>>,
    by_key: HashMap<RowKey, VecDeque<usize>>,
    by_id: HashMap<Value, VecDeque<usize>>,
}

impl PendingRows {
    fn push(&mut self, row: Row, id_column: &str) {
        let slot = self.slots.len();
        self.by_key.entry(row.key()).or_default().push_back(slot);
        if let Some(id) = row.get(id_column) {
            self.by_id.entry(id.clone()).or_default().push_back(slot);
        }
        self.slots.push(Some(row));
    }

    /// Earliest unclaimed row with canonical form `key`
    fn take_verbatim(&mut self, key: &RowKey) -> Option<Row> {
        claim_first(&mut self.slots, self.by_key.get_mut(key))
    }

    /// Earliest unclaimed row carrying `id`
    fn take_by_id(&mut self, id: &Value) -> Option<Row> {
        claim_first(&mut self.slots, self.by_id.get_mut(id))
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.by_key.clear();
        self.by_id.clear();
    }
}

fn claim_first(slots: &mut [Option<Row>], queue: Option<&mut VecDeque<usize>>) -> Option<Row> {
    let queue = queue?;
    while let Some(slot) = queue.pop_front() {
        if let Some(row) = slots.get_mut(slot).and_then(Option::take) {
            return Some(row);
        }
    }
    None
}

/// Match-as-you-go working sets
pub struct Reconciler {
    id_column: String,
    compare: CompareOptions,
    /// Keep unclaimed actual rows for later expected rows
    carry_actual: bool,
    /// Expected rows not matched yet, with their canonical key
    unmatched_expected: Vec<(RowKey, Row)>,
    pending_actual: PendingRows,
    errors: Vec<Discrepancy>,
    observed_actual: Vec<Row>,
    observed_expected: Vec<Row>,
    matched: usize,
}

impl Reconciler {
    pub fn new(id_column: impl Into<String>, carry_actual: bool) -> Self {
        Self {
            id_column: id_column.into(),
            compare: CompareOptions {
                skip_empty_row: true,
                complete_expected_row: false,
            },
            carry_actual,
            unmatched_expected: Vec::new(),
            pending_actual: PendingRows::default(),
            errors: Vec::new(),
            observed_actual: Vec::new(),
            observed_expected: Vec::new(),
            matched: 0,
        }
    }

    pub fn complete_expected_rows(mut self, complete: bool) -> Self {
        self.compare.complete_expected_row = complete;
        self
    }

    /// Add expected rows to the working set
    pub fn offer_expected(&mut self, rows: impl IntoIterator<Item = Row>) {
        for row in rows {
            let row = normalize(&row);
            self.observed_expected.push(row.clone());
            self.unmatched_expected.push((row.key(), row));
        }
    }

    /// Add a page of actual rows
    pub fn offer_actual(&mut self, rows: Vec<Row>) {
        self.observed_actual.extend(rows.iter().cloned());
        for row in rows {
            self.pending_actual.push(row, &self.id_column);
        }
    }

    /// Pair up what can be paired with the rows seen so far.
    ///
    /// Verbatim-equal rows cancel first. The remaining expected rows are then
    /// matched by identifier against the pending actual rows in arrival
    /// order; each actual row is claimed at most once.
    pub fn reconcile(&mut self) -> Result<()> {
        let mut still_unmatched = Vec::with_capacity(self.unmatched_expected.len());
        for (key, expected) in self.unmatched_expected.drain(..) {
            match self.pending_actual.take_verbatim(&key) {
                Some(_) => self.matched += 1,
                None => still_unmatched.push((key, expected)),
            }
        }

        for (key, expected) in still_unmatched {
            let id = identifier(&self.id_column, &expected)?;
            match self.pending_actual.take_by_id(id) {
                Some(actual) => {
                    if let Some(diff) =
                        compare_rows(&expected, Some(&actual), &self.id_column, self.compare)
                    {
                        debug!(column = %self.id_column, id = ?diff.id.value(), "row differs");
                        self.errors.push(Discrepancy::Field(diff));
                    }
                    self.matched += 1;
                }
                None => self.unmatched_expected.push((key, expected)),
            }
        }

        if !self.carry_actual {
            self.pending_actual.clear();
        }
        Ok(())
    }

    pub fn unmatched_expected(&self) -> usize {
        self.unmatched_expected.len()
    }

    /// Expected rows seen so far, normalized
    pub fn observed_expected(&self) -> &[Row] {
        &self.observed_expected
    }

    /// Close the books: expected rows still unmatched are not found
    pub fn finish(self) -> (QueryAssertionResult, Vec<Row>) {
        debug!(
            matched = self.matched,
            differing = self.errors.len(),
            not_found = self.unmatched_expected.len(),
            "reconciliation finished"
        );
        (
            QueryAssertionResult {
                errors: self.errors,
                not_found_rows: self
                    .unmatched_expected
                    .into_iter()
                    .map(|(_, row)| row)
                    .collect(),
                query_result: self.observed_actual,
            },
            self.observed_expected,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resultset::MemoryResultSet;
    use crate::value::Value;

    /// Records page sizes handed out, to check termination
    struct ScriptedPages {
        pages: Vec<usize>,
        calls: usize,
    }

    impl ResultSet for ScriptedPages {
        fn fetch_page(&mut self, _size: usize) -> Result<Vec<Row>> {
            let n = self.pages.get(self.calls).copied().unwrap_or(0);
            self.calls += 1;
            Ok((0..n).map(|i| Row::new().with("id", i as i64)).collect())
        }
    }

    #[test]
    fn test_exhaustion_after_empty_page() {
        let mut source = ScriptedPages { pages: vec![3, 3, 2, 0], calls: 0 };
        let mut driver = PageDriver::new(&mut source, 3);
        let mut sizes = Vec::new();
        while let Some(page) = driver.next_page().unwrap() {
            sizes.push(page.len());
        }
        assert_eq!(sizes, vec![3, 3, 2]);
        assert_eq!(driver.fetch_count(), 4);
        assert!(driver.is_exhausted());
        assert!(driver.next_page().unwrap().is_none());
        assert_eq!(source.calls, 4);
    }

    #[test]
    fn test_pages_are_normalized() {
        let mut rs = MemoryResultSet::new(vec![Row::new().with("n", Value::decimal("7.9").unwrap())]);
        let mut driver = PageDriver::new(&mut rs, 10);
        let page = driver.next_page().unwrap().unwrap();
        assert_eq!(page[0].get("n"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_retire_verbatim_counts_occurrences() {
        let a = Row::new().with("id", 1);
        let b = Row::new().with("id", 2);
        let mut rs = MemoryResultSet::new(vec![a.clone(), b.clone()]);
        let mut driver = PageDriver::new(&mut rs, 1);
        let (unmatched, observed) =
            retire_verbatim(&mut driver, &[a.clone(), a.clone(), b]).unwrap();
        assert_eq!(unmatched, vec![a]);
        assert_eq!(observed.len(), 2);
    }

    #[test]
    fn test_reconciler_rolls_rows_forward() {
        let mut rec = Reconciler::new("id", true);
        rec.offer_expected(vec![Row::new().with("id", 2).with("v", "x")]);
        rec.offer_actual(vec![Row::new().with("id", 1).with("v", "x")]);
        rec.reconcile().unwrap();
        assert_eq!(rec.unmatched_expected(), 1);

        rec.offer_actual(vec![Row::new().with("id", 2).with("v", "y")]);
        rec.reconcile().unwrap();
        let (result, _) = rec.finish();
        assert!(result.not_found_rows.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.query_result.len(), 2);
    }

    #[test]
    fn test_carried_row_claimed_once_across_pages() {
        let mut rec = Reconciler::new("id", true);
        rec.offer_actual(vec![Row::new().with("id", 1).with("v", "a")]);
        rec.reconcile().unwrap();

        rec.offer_expected(vec![
            Row::new().with("id", 1).with("v", "z"),
            Row::new().with("id", 1).with("v", "a"),
        ]);
        rec.offer_actual(vec![Row::new().with("id", 1).with("v", "b")]);
        rec.reconcile().unwrap();

        let (result, _) = rec.finish();
        assert!(result.not_found_rows.is_empty());
        assert_eq!(result.errors.len(), 1);
        let diff = result.errors[0].as_diff().unwrap();
        assert_eq!(diff.error_in_row, Row::new().with("v", "z"));
    }

    #[test]
    fn test_missing_identifier_is_an_error() {
        let mut rec = Reconciler::new("id", true);
        rec.offer_expected(vec![Row::new().with("v", "a")]);
        rec.offer_actual(vec![Row::new().with("id", 1).with("v", "b")]);
        assert!(matches!(
            rec.reconcile(),
            Err(crate::Error::MissingIdentifier { .. })
        ));
    }

    #[test]
    fn test_large_disjoint_comparison_page_by_page() {
        let mut rec = Reconciler::new("id", true);
        for i in 0..2_000i64 {
            rec.offer_expected(vec![Row::new().with("id", i).with("side", "left")]);
            rec.offer_actual(vec![Row::new().with("id", i + 2_000).with("side", "right")]);
            rec.reconcile().unwrap();
        }
        assert_eq!(rec.unmatched_expected(), 2_000);
        assert_eq!(rec.pending_actual.slots.iter().flatten().count(), 2_000);

        let (result, _) = rec.finish();
        assert!(result.errors.is_empty());
        assert_eq!(result.not_found_rows.len(), 2_000);
        assert_eq!(result.query_result.len(), 2_000);
    }

    #[test]
    fn test_exact_duplicate_preferred_over_first_id() {
        let mut rec = Reconciler::new("id", false);
        rec.offer_expected(vec![Row::new().with("id", 1).with("v", "b")]);
        rec.offer_actual(vec![
            Row::new().with("id", 1).with("v", "a"),
            Row::new().with("id", 1).with("v", "b"),
        ]);
        rec.reconcile().unwrap();
        let (result, _) = rec.finish();
        assert!(result.is_match());
    }
}
