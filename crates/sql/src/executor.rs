//! Timed query execution
//!
//! Every query runs through [`timed_query`], so the elapsed time is measured
//! once, around execution, and driver errors end up in the result's
//! `error_message` instead of aborting the test.

use lighttest_common::{timed_query, MemoryResultSet, QueryResult, Row, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use tracing::debug;

use crate::db::Database;
use crate::error::{SqlError, SqlResult};

/// Query front-end over one database
#[derive(Clone)]
pub struct SqlConnection {
    db: Database,
}

impl SqlConnection {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run a query given as text
    pub fn query_by_text(&self, text_query: &str, alias: &str) -> QueryResult {
        timed_query(alias, text_query, |sql| self.execute(sql, &[]))
    }

    /// `SELECT <columns> FROM <table> WHERE <filter_column> IN (<params>)`
    ///
    /// Identifiers are validated; values are bound as parameters.
    pub fn select_by_params(
        &self,
        table: &str,
        columns: &[&str],
        filter_column: &str,
        params: &[Value],
        alias: &str,
    ) -> SqlResult<QueryResult> {
        check_identifier(table)?;
        check_identifier(filter_column)?;
        for column in columns {
            check_identifier(column)?;
        }

        let projection = if columns.is_empty() {
            "*".to_string()
        } else {
            columns.join(", ")
        };
        let placeholders = (1..=params.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} WHERE {} IN ({})",
            projection, table, filter_column, placeholders
        );

        let bound = params
            .iter()
            .map(to_sql_value)
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(timed_query(alias, &sql, |sql| self.execute(sql, &bound)))
    }

    /// Execute and buffer the rows; the engine pages over the buffer
    fn execute(&self, sql: &str, params: &[SqlValue]) -> SqlResult<MemoryResultSet> {
        let conn = self.db.connection();
        let conn = conn.lock();
        let mut stmt = conn.prepare(sql)?;

        let columns: Vec<(String, bool)> = stmt
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), is_decimal_type(c.decl_type())))
            .collect();

        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut converted = Row::new();
            for (idx, (name, decimal)) in columns.iter().enumerate() {
                let value = from_sql_value(row.get_ref(idx)?, *decimal, name)?;
                converted.insert(name.clone(), value);
            }
            out.push(converted);
        }

        debug!(rows = out.len(), columns = columns.len(), "query buffered");
        Ok(MemoryResultSet::new(out))
    }
}

fn is_decimal_type(decl_type: Option<&str>) -> bool {
    decl_type.map_or(false, |t| {
        let t = t.to_ascii_uppercase();
        t.contains("DECIMAL") || t.contains("NUMERIC")
    })
}

fn check_identifier(name: &str) -> SqlResult<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(SqlError::InvalidIdentifier(name.to_string()))
    }
}

fn to_sql_value(value: &Value) -> SqlResult<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) | Value::Decimal(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::List(_) => return Err(SqlError::UnsupportedParameter("list")),
    })
}

fn from_sql_value(value: ValueRef<'_>, decimal: bool, column: &str) -> SqlResult<Value> {
    let invalid = |reason: String| SqlError::InvalidValue {
        column: column.to_string(),
        reason,
    };
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if decimal => Value::Decimal(i.to_string()),
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) if decimal => Value::Decimal(f.to_string()),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|e| invalid(e.to_string()))?;
            if decimal {
                Value::decimal(text).unwrap_or_else(|_| Value::Text(text.to_string()))
            } else {
                Value::Text(text.to_string())
            }
        }
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    })
}
