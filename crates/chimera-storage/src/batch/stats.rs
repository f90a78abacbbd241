//! Lock-free statistics for the share batch writer.
//!
//! Updated only through atomics, never under the buffer mutex, so readers
//! never contend with `insert`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use chimera_core::stats::BatchInsertStats;

/// Minimum window between insert-rate samples.
const RATE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    total_inserted: AtomicI64,
    total_batches: AtomicI64,
    total_errors: AtomicI64,
    failed_shares: AtomicI64,
    avg_batch_time_ns: AtomicI64,
    max_batch_time_ns: AtomicI64,
    pending_shares: AtomicI64,
    insert_rate: AtomicI64,
}

impl StatsRecorder {
    pub(crate) fn add_pending(&self, delta: i64) {
        self.pending_shares.fetch_add(delta, Ordering::Relaxed);
    }

    pub(crate) fn total_inserted(&self) -> i64 {
        self.total_inserted.load(Ordering::Relaxed)
    }

    pub(crate) fn record_success(&self, rows: usize, elapsed: Duration) {
        let ns = i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX);

        self.total_inserted.fetch_add(to_i64(rows), Ordering::Relaxed);
        self.total_batches.fetch_add(1, Ordering::Relaxed);
        self.max_batch_time_ns.fetch_max(ns, Ordering::AcqRel);
        let _ = self
            .avg_batch_time_ns
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |avg| {
                Some(avg.saturating_mul(9).saturating_add(ns) / 10)
            });
    }

    pub(crate) fn record_failure(&self, rows: usize) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
        self.failed_shares.fetch_add(to_i64(rows), Ordering::Relaxed);
    }

    fn store_rate(&self, rate: i64) {
        self.insert_rate.store(rate, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> BatchInsertStats {
        BatchInsertStats {
            total_inserted: self.total_inserted.load(Ordering::Relaxed),
            total_batches: self.total_batches.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            failed_shares: self.failed_shares.load(Ordering::Relaxed),
            avg_batch_time_ns: self.avg_batch_time_ns.load(Ordering::Relaxed),
            max_batch_time_ns: self.max_batch_time_ns.load(Ordering::Relaxed),
            pending_shares: self.pending_shares.load(Ordering::Relaxed),
            insert_rate: self.insert_rate.load(Ordering::Relaxed),
        }
    }
}

/// Turns the inserted-rows counter into a shares/second gauge.
/// Owned by the flush task; sampled on every tick.
pub(crate) struct RateSampler {
    since: Instant,
    inserted: i64,
}

impl RateSampler {
    pub(crate) fn new(stats: &StatsRecorder) -> Self {
        Self {
            since: Instant::now(),
            inserted: stats.total_inserted(),
        }
    }

    pub(crate) fn sample(&mut self, stats: &StatsRecorder) {
        let elapsed = self.since.elapsed();
        if elapsed < RATE_WINDOW {
            return;
        }
        let inserted = stats.total_inserted();
        let delta = u128::try_from(inserted - self.inserted).unwrap_or(0);
        let rate = delta * 1_000_000_000 / elapsed.as_nanos().max(1);
        stats.store_rate(i64::try_from(rate).unwrap_or(i64::MAX));
        self.since = Instant::now();
        self.inserted = inserted;
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
