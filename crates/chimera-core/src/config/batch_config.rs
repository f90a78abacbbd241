//! Share batch writer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_QUEUE_SIZE: usize = 100;
pub const DEFAULT_INSERT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for the batch writers.
///
/// Zero values mean "use the default"; writers always run on the
/// [`normalized`](Self::normalized) form so a partially filled config can
/// never start a writer that stalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchWriterConfig {
    /// Max rows accumulated before a forced flush.
    pub batch_size: usize,
    /// Max staleness of a partially filled batch.
    #[serde(rename = "flush_interval_ms", with = "crate::config::duration_ms")]
    pub flush_interval: Duration,
    /// Parallel persistence workers.
    pub worker_count: usize,
    /// Max batches waiting for a worker.
    pub queue_size: usize,
    /// Deadline for one batch statement.
    #[serde(rename = "insert_timeout_ms", with = "crate::config::duration_ms")]
    pub insert_timeout: Duration,
}

impl Default for BatchWriterConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            worker_count: DEFAULT_WORKER_COUNT,
            queue_size: DEFAULT_QUEUE_SIZE,
            insert_timeout: DEFAULT_INSERT_TIMEOUT,
        }
    }
}

impl BatchWriterConfig {
    /// A config with every field unset. Normalizes to [`Default`].
    pub const fn zeroed() -> Self {
        Self {
            batch_size: 0,
            flush_interval: Duration::ZERO,
            worker_count: 0,
            queue_size: 0,
            insert_timeout: Duration::ZERO,
        }
    }

    /// Replace every zero field with its default.
    pub fn normalized(mut self) -> Self {
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        if self.flush_interval.is_zero() {
            self.flush_interval = DEFAULT_FLUSH_INTERVAL;
        }
        if self.worker_count == 0 {
            self.worker_count = DEFAULT_WORKER_COUNT;
        }
        if self.queue_size == 0 {
            self.queue_size = DEFAULT_QUEUE_SIZE;
        }
        if self.insert_timeout.is_zero() {
            self.insert_timeout = DEFAULT_INSERT_TIMEOUT;
        }
        self
    }
}
