//! Point-in-time statistics snapshots for the writer and the pool.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Snapshot of share batch writer statistics.
///
/// Counters are monotonic; `pending_shares` is a live gauge of rows buffered
/// but not yet handed to a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInsertStats {
    pub total_inserted: i64,
    pub total_batches: i64,
    /// Failed batch statements.
    pub total_errors: i64,
    /// Rows contained in failed batches.
    pub failed_shares: i64,
    /// Exponential moving average of batch latency, 9:1 toward history.
    pub avg_batch_time_ns: i64,
    pub max_batch_time_ns: i64,
    pub pending_shares: i64,
    /// Shares per second, sampled roughly once a second.
    pub insert_rate: i64,
}

impl BatchInsertStats {
    pub fn avg_batch_time(&self) -> Duration {
        Duration::from_nanos(u64::try_from(self.avg_batch_time_ns).unwrap_or(0))
    }

    pub fn max_batch_time(&self) -> Duration {
        Duration::from_nanos(u64::try_from(self.max_batch_time_ns).unwrap_or(0))
    }

    /// Every share handed to the writer that has reached a terminal state.
    pub fn accounted_shares(&self) -> i64 {
        self.total_inserted + self.failed_shares
    }
}

/// Snapshot of connection pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub max_conns: usize,
    pub open_conns: usize,
    pub in_use: usize,
    pub idle: usize,
    /// Acquisitions that had to wait for a free connection.
    pub wait_count: u64,
    pub wait_duration: Duration,
    pub max_lifetime_closed: u64,
    pub max_idle_time_closed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_stats_report_zero_durations() {
        let stats = BatchInsertStats::default();
        assert_eq!(stats.avg_batch_time(), Duration::ZERO);
        assert_eq!(stats.max_batch_time(), Duration::ZERO);
        assert_eq!(stats.accounted_shares(), 0);
    }

    #[test]
    fn stats_serialize_with_field_names() {
        let stats = BatchInsertStats {
            total_inserted: 4,
            total_batches: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["total_inserted"], 4);
        assert_eq!(json["total_batches"], 2);
        assert_eq!(json["pending_shares"], 0);
    }
}
