//! Coarse classification of storage errors.

use serde::{Deserialize, Serialize};

/// Which part of the persistence layer an error came from, and therefore
/// how a caller is expected to react to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid pool or writer parameters. Fatal to startup.
    Configuration,
    /// The store cannot be reached or the pool cannot hand out a connection.
    /// Recoverable by retrying startup or the call.
    Connectivity,
    /// A specific statement failed, such as a constraint violation or a timeout.
    BatchExecution,
    /// Caller-supplied rows, columns, or identifiers were rejected before any
    /// statement was built.
    InvalidInput,
    /// The writer or transaction was used in the wrong state.
    Lifecycle,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Connectivity => "connectivity",
            Self::BatchExecution => "batch_execution",
            Self::InvalidInput => "invalid_input",
            Self::Lifecycle => "lifecycle",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
