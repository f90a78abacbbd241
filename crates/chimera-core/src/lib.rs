//! # chimera-core
//!
//! Foundation crate for the Chimera share persistence layer.
//! Defines the share record, configuration, errors, statistics snapshots,
//! the share-writer trait seam, and tracing setup.
//! The storage crate and the ingestion layer both depend on this.

pub mod config;
pub mod errors;
pub mod share;
pub mod stats;
pub mod tracing;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use config::{BatchWriterConfig, PoolConfig, StoreConfig};
pub use errors::{ErrorKind, StoreError, StoreResult};
pub use share::Share;
pub use stats::{BatchInsertStats, PoolStats};
pub use traits::IShareWriter;
