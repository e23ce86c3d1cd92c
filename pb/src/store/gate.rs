//! ExecutionGate - sanitize and run a statement
//!
//! The sanitizer is a textual screen, not a parser: it keeps multiple
//! statements and comments out, and the read-only connection does the rest.

use std::path::{Path, PathBuf};

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::domain::{QueryResult, Value};

use super::GateError;

const BLOCKED: &[(&str, &str)] = &[(";", "multiple statements"), ("--", "comment"), ("/*", "comment"), ("*/", "comment")];

/// Screen a statement before it reaches the store
///
/// Trims, drops at most one trailing `;`, then rejects anything still
/// carrying a statement separator or comment marker.
pub fn sanitize(statement: &str) -> Result<String, GateError> {
    let sql = statement.trim();
    if sql.is_empty() {
        return Err(GateError::Unsafe {
            statement: statement.to_string(),
            reason: "empty statement",
        });
    }

    let sql = match sql.strip_suffix(';') {
        Some(stripped) => stripped.trim(),
        None => sql,
    };

    if let Some(&(_, reason)) = BLOCKED.iter().find(|(marker, _)| sql.contains(marker)) {
        debug!(%reason, "sanitize: rejected");
        return Err(GateError::Unsafe {
            statement: statement.to_string(),
            reason,
        });
    }

    if sql.is_empty() {
        return Err(GateError::Unsafe {
            statement: statement.to_string(),
            reason: "empty statement",
        });
    }

    Ok(sql.to_string())
}

/// Runs sanitized statements against the store
#[derive(Debug, Clone)]
pub struct ExecutionGate {
    db_path: PathBuf,
}

impl ExecutionGate {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self { db_path: db_path.into() }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Sanitize and execute, materializing every row in order
    ///
    /// Each call opens its own read-only connection.
    pub fn execute(&self, statement: &str) -> Result<QueryResult, GateError> {
        debug!(%statement, "ExecutionGate::execute: called");
        let sql = sanitize(statement)?;

        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| GateError::Open {
            path: self.db_path.clone(),
            message: e.to_string(),
        })?;

        let mut stmt = conn.prepare(&sql)?;
        let columns = stmt.column_names().iter().map(ToString::to_string).collect::<Vec<_>>();

        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                record.push(Value::from(row.get::<usize, SqlValue>(index)?));
            }
            records.push(record);
        }

        info!(columns = columns.len(), rows = records.len(), "query executed");
        Ok(QueryResult::new(columns, records))
    }

    /// [`execute`](Self::execute) on the blocking pool, off the async workers
    pub async fn execute_async(&self, statement: &str) -> Result<QueryResult, GateError> {
        let gate = self.clone();
        let statement = statement.to_string();
        tokio::task::spawn_blocking(move || gate.execute(&statement))
            .await
            .map_err(|e| GateError::Execution(format!("query task failed: {}", e)))?
    }
}
