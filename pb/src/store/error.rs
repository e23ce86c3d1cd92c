//! Store error types

use std::path::PathBuf;

use thiserror::Error;

/// Why a statement was not run, or failed while running
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Unsafe SQL ({reason}): {statement}")]
    Unsafe { statement: String, reason: &'static str },

    #[error("{0}")]
    Execution(String),

    #[error("Cannot open store {}: {message}", path.display())]
    Open { path: PathBuf, message: String },
}

impl GateError {
    pub fn is_unsafe(&self) -> bool {
        matches!(self, GateError::Unsafe { .. })
    }
}

impl From<rusqlite::Error> for GateError {
    fn from(e: rusqlite::Error) -> Self {
        GateError::Execution(e.to_string())
    }
}
