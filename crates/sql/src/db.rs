//! SQLite connection handle

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::SqlResult;

/// Shared SQLite connection
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> SqlResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        info!("Opened database at {:?}", path.as_ref());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> SqlResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run one or more statements, e.g. fixtures
    pub fn execute_batch(&self, sql: &str) -> SqlResult<()> {
        debug!(bytes = sql.len(), "executing batch");
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    /// Expose the underlying connection to the executor
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }
}
