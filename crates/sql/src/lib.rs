//! LightTest SQL
//!
//! Executes queries against an embedded SQLite database and hands the
//! results to the assertion engine as timed, paginated [`QueryResult`]s.
//!
//! [`QueryResult`]: lighttest_common::QueryResult

pub mod db;
pub mod error;
pub mod executor;

pub use db::Database;
pub use error::{SqlError, SqlResult};
pub use executor::SqlConnection;
