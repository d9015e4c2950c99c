//! Store error type shared by schema, loader, aggregation, and queries.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("store is closed")]
    Closed,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("store operation panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    /// Timeouts are transient; everything else needs operator attention or
    /// different input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Timeout(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
