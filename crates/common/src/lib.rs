//! LightTest Common Library
//!
//! The query-result assertion engine: reconciles an expected result with an
//! actual result streamed in pages from a database cursor, and classifies
//! the outcome together with the query's elapsed time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  QueryAsserter::run(strategy, QueryResult, options)          │
//! │    ├── AssertionOptions::resolve(defaults)                   │
//! │    ├── AssertionStrategy                                     │
//! │    │     ├── ExactMatch        (multiset equality)           │
//! │    │     ├── SubsetMatch       (verbatim rows, paged)        │
//! │    │     ├── PredicateMatch    (closure over all rows)       │
//! │    │     ├── DeepSubsetMatch   (id match + field diff)       │
//! │    │     └── ResultComparator  (two cursors co-drained)      │
//! │    │           └── PageDriver / Reconciler                   │
//! │    │                 └── find_by_id / compare_rows           │
//! │    │                       └── normalize                     │
//! │    └── classify(match, elapsed < limit, positivity)          │
//! │          └── Verdict { successful | slow | failed | … }      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod assertion;
pub mod compare;
pub mod config;
pub mod error;
pub mod matcher;
pub mod pagination;
pub mod performance;
pub mod predicate;
pub mod report;
pub mod result;
pub mod resultset;
pub mod strategy;
pub mod value;

// Re-export commonly used types
pub use assertion::{AssertionOutcome, QueryAsserter};
pub use compare::{compare_rows, CompareOptions, DiffId, DiffRecord, MATCH_NOT_FOUND};
pub use config::{AssertionDefaults, AssertionOptions, ResolvedOptions};
pub use error::{Error, Result};
pub use matcher::find_by_id;
pub use pagination::{PageDriver, Reconciler, DEFAULT_FETCH_SIZE};
pub use performance::{classify, Classification, Positivity, Verdict};
pub use predicate::Predicate;
pub use report::QueryReport;
pub use result::{Discrepancy, QueryAssertionResult};
pub use resultset::{timed_query, EmptyResultSet, MemoryResultSet, QueryResult, ResultSet};
pub use strategy::{
    AssertionStrategy, DeepSubsetMatch, ExactMatch, PredicateMatch, ResultComparator, SubsetMatch,
};
pub use value::{normalize, Row, RowKey, Value};

/// LightTest version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
