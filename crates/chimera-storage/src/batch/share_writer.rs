//! ShareBatchWriter — buffered, multi-worker share persistence.
//!
//! `insert` appends to a mutex-guarded buffer. A full buffer is swapped out
//! and offered to a bounded crossbeam queue drained by worker threads; when
//! the queue is full the batch is written on the caller's thread instead.
//! A flush thread ships partial buffers every `flush_interval`.
//! Each batch is one multi-row INSERT bounded by `insert_timeout`.
//! Failed batches are counted and dropped, never retried.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use rusqlite::ToSql;
use tracing::{debug, info, warn};

use chimera_core::config::BatchWriterConfig;
use chimera_core::errors::{StoreError, StoreResult};
use chimera_core::share::Share;
use chimera_core::stats::BatchInsertStats;
use chimera_core::traits::IShareWriter;

use super::statement;
use super::stats::{RateSampler, StatsRecorder};
use crate::context::Context;
use crate::pool::{ConnectionPool, Executor};
use crate::schema::{SHARES_TABLE, SHARE_COLUMNS};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Buffers shares and writes them to the `shares` table in batches.
pub struct ShareBatchWriter {
    inner: Arc<WriterInner>,
    threads: Mutex<WriterThreads>,
}

#[derive(Default)]
struct WriterThreads {
    workers: Vec<JoinHandle<()>>,
    flusher: Option<JoinHandle<()>>,
    shutdown_tx: Option<Sender<()>>,
}

struct WriterInner {
    config: BatchWriterConfig,
    pool: Arc<ConnectionPool>,
    pending: Mutex<Vec<Share>>,
    queue_tx: RwLock<Option<Sender<Vec<Share>>>>,
    queue_rx: Receiver<Vec<Share>>,
    stats: StatsRecorder,
    lifecycle: AtomicU8,
}

impl ShareBatchWriter {
    /// Create a writer over `pool`. Zero-valued config fields take defaults.
    /// Nothing runs until `start`.
    pub fn new(pool: Arc<ConnectionPool>, config: BatchWriterConfig) -> Self {
        let config = config.normalized();
        let (queue_tx, queue_rx) = bounded(config.queue_size);

        Self {
            inner: Arc::new(WriterInner {
                pending: Mutex::new(Vec::with_capacity(config.batch_size)),
                queue_tx: RwLock::new(Some(queue_tx)),
                queue_rx,
                stats: StatsRecorder::default(),
                lifecycle: AtomicU8::new(IDLE),
                config,
                pool,
            }),
            threads: Mutex::new(WriterThreads::default()),
        }
    }

    pub fn config(&self) -> &BatchWriterConfig {
        &self.inner.config
    }

    /// Spawn `worker_count` workers and the periodic flush thread.
    pub fn start(&self) -> StoreResult<()> {
        let mut threads = self.lock_threads();

        match self
            .inner
            .lifecycle
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(RUNNING) => return Err(StoreError::WriterState("writer already started")),
            Err(_) => return Err(StoreError::WriterState("writer already stopped")),
        }

        for id in 0..self.inner.config.worker_count {
            let inner = Arc::clone(&self.inner);
            let rx = self.inner.queue_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("share-writer-{id}"))
                .spawn(move || worker_loop(id, &inner, &rx))
                .map_err(StoreError::Spawn)?;
            threads.workers.push(handle);
        }

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let inner = Arc::clone(&self.inner);
        let flusher = thread::Builder::new()
            .name("share-flusher".to_string())
            .spawn(move || flush_loop(&inner, &shutdown_rx))
            .map_err(StoreError::Spawn)?;
        threads.flusher = Some(flusher);
        threads.shutdown_tx = Some(shutdown_tx);

        info!(
            workers = self.inner.config.worker_count,
            batch_size = self.inner.config.batch_size,
            queue_size = self.inner.config.queue_size,
            flush_interval_ms = self.inner.config.flush_interval.as_millis() as u64,
            "share batch writer started"
        );
        Ok(())
    }

    /// Buffer one share. Never fails; write errors surface in `stats`.
    pub fn insert(&self, share: Share) {
        self.inner.insert(share);
    }

    /// Write `shares` now, on the caller's thread, bypassing the buffer.
    ///
    /// One statement per call unless the batch exceeds the store's parameter
    /// limit, in which case it is split at that limit.
    pub fn insert_batch(&self, shares: &[Share]) -> StoreResult<()> {
        let chunk = statement::max_rows_per_statement(SHARE_COLUMNS.len());
        for part in shares.chunks(chunk) {
            self.inner.persist(part)?;
        }
        Ok(())
    }

    /// Ship whatever is buffered now.
    pub fn flush(&self) {
        self.inner.flush();
    }

    pub fn stats(&self) -> BatchInsertStats {
        self.inner.stats.snapshot()
    }

    /// Stop the flush thread, flush the remainder, close the queue and wait
    /// for workers to drain it. Every share inserted before `stop` is written
    /// or counted as failed when this returns. Idempotent.
    pub fn stop(&self) -> StoreResult<()> {
        let mut threads = self.lock_threads();

        if self.inner.lifecycle.swap(STOPPED, Ordering::AcqRel) == STOPPED {
            return Ok(());
        }

        let mut panicked = 0usize;

        // The flush thread must be gone before the final flush.
        threads.shutdown_tx.take();
        if let Some(flusher) = threads.flusher.take() {
            if flusher.join().is_err() {
                panicked += 1;
            }
        }

        self.inner.flush();
        self.inner.close_queue();

        for worker in threads.workers.drain(..) {
            if worker.join().is_err() {
                panicked += 1;
            }
        }

        // Batches nobody consumed (never started, or a worker died).
        while let Ok(batch) = self.inner.queue_rx.try_recv() {
            self.inner.persist_logged(&batch);
        }
        let leftover = self.inner.take_pending();
        if !leftover.is_empty() {
            self.inner.stats.add_pending(-(leftover.len() as i64));
            self.inner.persist_logged(&leftover);
        }

        self.inner.pool.flush_statement_cache();

        let stats = self.stats();
        info!(
            total_inserted = stats.total_inserted,
            total_batches = stats.total_batches,
            total_errors = stats.total_errors,
            failed_shares = stats.failed_shares,
            "share batch writer stopped"
        );

        if panicked > 0 {
            return Err(StoreError::WriterState("writer thread panicked"));
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.lifecycle.load(Ordering::Acquire) == RUNNING
    }

    fn lock_threads(&self) -> MutexGuard<'_, WriterThreads> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ShareBatchWriter {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "share batch writer did not stop cleanly");
        }
    }
}

impl IShareWriter for ShareBatchWriter {
    fn insert(&self, share: Share) {
        ShareBatchWriter::insert(self, share);
    }

    fn insert_batch(&self, shares: &[Share]) -> Result<(), StoreError> {
        ShareBatchWriter::insert_batch(self, shares)
    }

    fn flush(&self) {
        ShareBatchWriter::flush(self);
    }

    fn stats(&self) -> BatchInsertStats {
        ShareBatchWriter::stats(self)
    }
}

impl WriterInner {
    fn insert(&self, share: Share) {
        let full = {
            let mut pending = self.lock_pending();
            // Checked under the buffer lock: `stop` drains the buffer after
            // flipping the state, so a share is either drained or written here.
            if self.lifecycle.load(Ordering::Acquire) == STOPPED {
                drop(pending);
                debug!("insert after stop, writing synchronously");
                self.persist_logged(std::slice::from_ref(&share));
                return;
            }
            pending.push(share);
            if pending.len() >= self.config.batch_size {
                Some(std::mem::replace(
                    &mut *pending,
                    Vec::with_capacity(self.config.batch_size),
                ))
            } else {
                None
            }
        };

        match full {
            None => self.stats.add_pending(1),
            Some(batch) => {
                // This share was never counted; the rest of the batch was.
                self.stats.add_pending(1 - batch.len() as i64);
                self.dispatch(batch);
            }
        }
    }

    fn flush(&self) {
        let batch = self.take_pending();
        if batch.is_empty() {
            return;
        }
        self.stats.add_pending(-(batch.len() as i64));
        self.dispatch(batch);
    }

    fn take_pending(&self) -> Vec<Share> {
        let mut pending = self.lock_pending();
        if pending.is_empty() {
            return Vec::new();
        }
        std::mem::replace(&mut *pending, Vec::with_capacity(self.config.batch_size))
    }

    /// Queue `batch` for a worker, or write it here when the queue is full
    /// or closed.
    fn dispatch(&self, batch: Vec<Share>) {
        let rejected = {
            let queue = self.queue_tx.read().unwrap_or_else(PoisonError::into_inner);
            match queue.as_ref() {
                Some(tx) => match tx.try_send(batch) {
                    Ok(()) => None,
                    Err(TrySendError::Full(batch)) | Err(TrySendError::Disconnected(batch)) => {
                        Some(batch)
                    }
                },
                None => Some(batch),
            }
        };

        if let Some(batch) = rejected {
            debug!(rows = batch.len(), "work queue full, writing batch on caller thread");
            self.persist_logged(&batch);
        }
    }

    fn close_queue(&self) {
        let mut queue = self.queue_tx.write().unwrap_or_else(PoisonError::into_inner);
        queue.take();
    }

    fn persist_logged(&self, shares: &[Share]) {
        if let Err(e) = self.persist(shares) {
            warn!(rows = shares.len(), error = %e, "share batch insert failed, rows dropped");
        }
    }

    /// Write one batch and record the outcome.
    fn persist(&self, shares: &[Share]) -> StoreResult<()> {
        if shares.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let ctx = Context::with_timeout(self.config.insert_timeout);
        let result = insert_shares(&self.pool, &ctx, shares);
        let elapsed = started.elapsed();

        match result {
            Ok(_) => {
                self.stats.record_success(shares.len(), elapsed);
                debug!(rows = shares.len(), elapsed_us = elapsed.as_micros() as u64, "share batch written");
                Ok(())
            }
            Err(source) => {
                self.stats.record_failure(shares.len());
                Err(StoreError::BatchInsert {
                    rows: shares.len(),
                    source: Box::new(source),
                })
            }
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<Share>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn worker_loop(id: usize, inner: &WriterInner, rx: &Receiver<Vec<Share>>) {
    debug!(worker = id, "share writer worker started");
    for batch in rx.iter() {
        inner.persist_logged(&batch);
    }
    debug!(worker = id, "share writer worker exiting");
}

fn flush_loop(inner: &WriterInner, shutdown_rx: &Receiver<()>) {
    let mut sampler = RateSampler::new(&inner.stats);
    loop {
        match shutdown_rx.recv_timeout(inner.config.flush_interval) {
            Err(RecvTimeoutError::Timeout) => {
                inner.flush();
                sampler.sample(&inner.stats);
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// One multi-row INSERT over the share columns. Unset timestamps become now.
fn insert_shares(pool: &ConnectionPool, ctx: &Context, shares: &[Share]) -> StoreResult<usize> {
    let sql = statement::multi_row_insert(SHARES_TABLE, &SHARE_COLUMNS, shares.len(), None);
    let now = Utc::now();
    let stamps: Vec<DateTime<Utc>> = shares.iter().map(|s| s.timestamp_or(now)).collect();

    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(shares.len() * SHARE_COLUMNS.len());
    for (share, stamp) in shares.iter().zip(&stamps) {
        params.extend_from_slice(&[
            &share.miner_id as &dyn ToSql,
            &share.user_id,
            &share.difficulty,
            &share.is_valid,
            &share.nonce,
            &share.hash,
            stamp,
        ]);
    }

    pool.exec(ctx, &sql, params.as_slice())
}
