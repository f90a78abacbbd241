//! `IShareWriter` trait — the share ingestion seam.
//!
//! The protocol layer records shares through this trait and never sees the
//! pool, the queue, or the workers behind it.

use std::sync::Arc;

use crate::errors::StoreError;
use crate::share::Share;
use crate::stats::BatchInsertStats;

pub trait IShareWriter: Send + Sync {
    /// Buffer one share. Fire-and-forget: failures show up in the stats only.
    fn insert(&self, share: Share);

    /// Persist an explicit batch now, on the caller's thread. One statement,
    /// unless the batch exceeds the store's parameter limit and is split.
    fn insert_batch(&self, shares: &[Share]) -> Result<(), StoreError>;

    /// Hand any partially filled buffer to the workers.
    fn flush(&self);

    fn stats(&self) -> BatchInsertStats;
}

// ─── Arc blanket impl ───────────────────────────────────────────────

impl<T: IShareWriter + ?Sized> IShareWriter for Arc<T> {
    fn insert(&self, share: Share) {
        (**self).insert(share)
    }
    fn insert_batch(&self, shares: &[Share]) -> Result<(), StoreError> {
        (**self).insert_batch(shares)
    }
    fn flush(&self) {
        (**self).flush()
    }
    fn stats(&self) -> BatchInsertStats {
        (**self).stats()
    }
}
