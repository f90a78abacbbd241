//! Storage-layer errors for pool, transaction, and batch operations.

use std::path::PathBuf;

use super::error_kind::ErrorKind;

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid configuration: {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("failed to open database {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("context cancelled")]
    Cancelled,

    #[error("connection pool is closed")]
    PoolClosed,

    #[error("timed out waiting for a connection ({in_use} of {max_conns} in use)")]
    PoolTimeout { in_use: usize, max_conns: usize },

    #[error("connection pool lock poisoned")]
    LockPoisoned,

    #[error("health check failed: {reason}")]
    Unhealthy { reason: String },

    #[error("transaction has already been committed or rolled back")]
    TransactionDone,

    #[error("row {row} has {got} values, expected {expected}")]
    RowLength {
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("batch insert requires at least one column")]
    EmptyColumns,

    #[error("statement needs {params} parameters, store limit is {limit}")]
    TooManyParameters { params: usize, limit: usize },

    #[error("batch insert of {rows} rows failed: {source}")]
    BatchInsert {
        rows: usize,
        #[source]
        source: Box<StoreError>,
    },

    #[error("writer state error: {0}")]
    WriterState(&'static str),

    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl StoreError {
    /// Classify this error for callers deciding whether to retry, alert, or abort.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig { .. } => ErrorKind::Configuration,
            Self::Connect { .. }
            | Self::PoolClosed
            | Self::PoolTimeout { .. }
            | Self::LockPoisoned
            | Self::Unhealthy { .. } => ErrorKind::Connectivity,
            Self::Sqlite(_) | Self::DeadlineExceeded | Self::Cancelled => {
                ErrorKind::BatchExecution
            }
            Self::BatchInsert { source, .. } => match source.kind() {
                ErrorKind::Connectivity => ErrorKind::Connectivity,
                _ => ErrorKind::BatchExecution,
            },
            Self::RowLength { .. }
            | Self::InvalidIdentifier(_)
            | Self::EmptyColumns
            | Self::TooManyParameters { .. } => ErrorKind::InvalidInput,
            Self::TransactionDone | Self::WriterState(_) | Self::Spawn(_) => ErrorKind::Lifecycle,
        }
    }

    /// True for a context expiry or pool checkout timeout, possibly wrapped
    /// in a batch failure.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::DeadlineExceeded | Self::PoolTimeout { .. } => true,
            Self::BatchInsert { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}
