//! Connection pool configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};

pub const DEFAULT_MAX_CONNS: usize = 25;
pub const DEFAULT_MIN_CONNS: usize = 5;
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_IDLE_TIME: Duration = Duration::from_secs(60);
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 64;

/// Configuration for the SQLite connection pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Database file. Created on first open.
    pub path: PathBuf,
    /// Upper bound on open connections. 0 = default (25).
    pub max_conns: usize,
    /// Idle connections retained between uses. 0 = default (5), capped at `max_conns`.
    pub min_conns: usize,
    /// Connections older than this are closed instead of reused.
    #[serde(rename = "max_lifetime_ms", with = "crate::config::duration_ms")]
    pub max_lifetime: Duration,
    /// Idle connections unused for longer than this are closed.
    #[serde(rename = "max_idle_time_ms", with = "crate::config::duration_ms")]
    pub max_idle_time: Duration,
    /// SQLite busy timeout applied to each connection.
    #[serde(rename = "busy_timeout_ms", with = "crate::config::duration_ms")]
    pub busy_timeout: Duration,
    /// Bound on the startup ping.
    #[serde(rename = "connect_timeout_ms", with = "crate::config::duration_ms")]
    pub connect_timeout: Duration,
    /// Prepared statements cached per connection.
    pub statement_cache_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("chimera_pool.db"),
            max_conns: DEFAULT_MAX_CONNS,
            min_conns: DEFAULT_MIN_CONNS,
            max_lifetime: DEFAULT_MAX_LIFETIME,
            max_idle_time: DEFAULT_MAX_IDLE_TIME,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
        }
    }
}

impl PoolConfig {
    /// Defaults pointed at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Reject configurations that cannot produce a working pool.
    pub fn validate(&self) -> StoreResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(StoreError::InvalidConfig {
                field: "path",
                reason: "database path cannot be empty".to_string(),
            });
        }
        if self.max_conns > 0 && self.min_conns > self.max_conns {
            return Err(StoreError::InvalidConfig {
                field: "min_conns",
                reason: format!(
                    "min connections ({}) cannot be greater than max connections ({})",
                    self.min_conns, self.max_conns
                ),
            });
        }
        Ok(())
    }

    pub fn effective_max_conns(&self) -> usize {
        if self.max_conns == 0 {
            DEFAULT_MAX_CONNS
        } else {
            self.max_conns
        }
    }

    /// Idle connections retained; never more than the open-connection bound.
    pub fn effective_max_idle(&self) -> usize {
        let idle = if self.min_conns == 0 {
            DEFAULT_MIN_CONNS
        } else {
            self.min_conns
        };
        idle.min(self.effective_max_conns())
    }

    pub fn effective_max_lifetime(&self) -> Duration {
        or_default(self.max_lifetime, DEFAULT_MAX_LIFETIME)
    }

    pub fn effective_max_idle_time(&self) -> Duration {
        or_default(self.max_idle_time, DEFAULT_MAX_IDLE_TIME)
    }

    pub fn effective_busy_timeout(&self) -> Duration {
        or_default(self.busy_timeout, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn effective_connect_timeout(&self) -> Duration {
        or_default(self.connect_timeout, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn effective_statement_cache_capacity(&self) -> usize {
        if self.statement_cache_capacity == 0 {
            DEFAULT_STATEMENT_CACHE_CAPACITY
        } else {
            self.statement_cache_capacity
        }
    }
}

fn or_default(value: Duration, default: Duration) -> Duration {
    if value.is_zero() {
        default
    } else {
        value
    }
}
