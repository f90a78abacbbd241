//! Database — the entry point the pool service holds.
//!
//! Owns the shared connection pool and hands out writers bound to it.

use std::sync::Arc;

use tracing::{info, warn};

use chimera_core::config::{BatchWriterConfig, PoolConfig};
use chimera_core::errors::{StoreError, StoreResult};
use chimera_core::stats::PoolStats;

use crate::batch::{GenericBatchWriter, ShareBatchWriter};
use crate::context::Context;
use crate::pool::{ConnectionPool, Executor};
use crate::schema::SHARES_TABLE;

pub struct Database {
    pool: Arc<ConnectionPool>,
}

impl Database {
    /// Open the pool and verify the store answers within `connect_timeout`.
    pub fn open(config: PoolConfig) -> StoreResult<Self> {
        let pool = ConnectionPool::open(config)?;
        let ctx = Context::with_timeout(pool.config().effective_connect_timeout());
        if !pool.health_check(&ctx) {
            pool.close();
            return Err(StoreError::Unhealthy {
                reason: "initial health check failed".to_string(),
            });
        }
        info!(path = %pool.config().path.display(), "database connection established");
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Pool health plus presence of the shares table.
    pub fn health_check(&self, ctx: &Context) -> StoreResult<()> {
        if !self.pool.health_check(ctx) {
            return Err(StoreError::Unhealthy {
                reason: "pool health check failed".to_string(),
            });
        }
        let sql = format!("SELECT 1 FROM {SHARES_TABLE} LIMIT 1");
        self.pool
            .with_conn(ctx, |conn| {
                conn.prepare_cached(&sql)?;
                Ok(())
            })
            .map_err(|e| {
                warn!(error = %e, "shares table check failed");
                StoreError::Unhealthy {
                    reason: format!("shares table unavailable: {e}"),
                }
            })
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn share_writer(&self, config: BatchWriterConfig) -> ShareBatchWriter {
        ShareBatchWriter::new(Arc::clone(&self.pool), config)
    }

    pub fn generic_writer(&self, config: BatchWriterConfig) -> GenericBatchWriter {
        GenericBatchWriter::new(Arc::clone(&self.pool), config)
    }

    pub fn close(&self) {
        self.pool.close();
    }
}
