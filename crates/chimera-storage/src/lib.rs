//! # chimera-storage
//!
//! SQLite persistence for the Chimera mining pool.
//!
//! - [`pool`]: bounded connection pool with context-scoped queries and transactions
//! - [`batch::ShareBatchWriter`]: buffered multi-worker share ingestion
//! - [`batch::GenericBatchWriter`]: single-statement multi-row inserts for any table
//! - [`Database`]: opens the pool and hands out writers

pub mod batch;
pub mod context;
pub mod database;
pub mod pool;
pub mod schema;

pub use batch::{GenericBatchWriter, ShareBatchWriter};
pub use context::Context;
pub use database::Database;
pub use pool::{ConnectionPool, Executor, Transaction, TxState};
