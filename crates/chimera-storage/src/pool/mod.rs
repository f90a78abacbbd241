//! ConnectionPool — a bounded set of SQLite connections.
//!
//! Connections are opened lazily up to `max_conns`, retained idle up to the
//! idle bound, and closed once they outlive `max_lifetime` or sit idle past
//! `max_idle_time`. Acquisition waits on a condvar, bounded by the caller's
//! `Context`. Statistics live in atomics so observers never take the pool lock.

mod connection;
mod executor;
pub mod pragmas;
mod transaction;

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rusqlite::Connection;
use tracing::{debug, info};

use chimera_core::config::PoolConfig;
use chimera_core::errors::{StoreError, StoreResult};
use chimera_core::stats::PoolStats;

use crate::context::Context;

pub use connection::PooledConnection;
pub use executor::Executor;
pub use transaction::{Transaction, TxState};

/// Longest single condvar wait, so cancellation is noticed while blocked.
const WAIT_SLICE: Duration = Duration::from_millis(25);

struct IdleConn {
    conn: Connection,
    created_at: Instant,
    returned_at: Instant,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<IdleConn>,
    open: usize,
    closed: bool,
}

#[derive(Default)]
struct PoolCounters {
    open: AtomicUsize,
    in_use: AtomicUsize,
    wait_count: AtomicU64,
    wait_ns: AtomicU64,
    lifetime_closed: AtomicU64,
    idle_closed: AtomicU64,
}

enum Expiry {
    Lifetime,
    IdleTime,
}

pub struct ConnectionPool {
    config: PoolConfig,
    max_conns: usize,
    max_idle: usize,
    max_lifetime: Duration,
    max_idle_time: Duration,
    busy_timeout: Duration,
    state: Mutex<PoolState>,
    available: Condvar,
    counters: PoolCounters,
}

impl ConnectionPool {
    /// Validate `config`, open the first connection, and ping it.
    ///
    /// Fails fast: a bad path or unreachable database is reported here rather
    /// than on first use.
    pub fn open(config: PoolConfig) -> StoreResult<Self> {
        config.validate()?;

        let pool = Self {
            max_conns: config.effective_max_conns(),
            max_idle: config.effective_max_idle(),
            max_lifetime: config.effective_max_lifetime(),
            max_idle_time: config.effective_max_idle_time(),
            busy_timeout: config.effective_busy_timeout(),
            config,
            state: Mutex::new(PoolState::default()),
            available: Condvar::new(),
            counters: PoolCounters::default(),
        };

        let ctx = Context::with_timeout(pool.config.effective_connect_timeout());
        pool.ping(&ctx)?;

        info!(
            path = %pool.config.path.display(),
            max_conns = pool.max_conns,
            max_idle = pool.max_idle,
            "connection pool opened"
        );
        Ok(pool)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Check out a connection, waiting while all `max_conns` are in use.
    pub fn acquire(&self, ctx: &Context) -> StoreResult<PooledConnection<'_>> {
        ctx.check()?;

        let mut state = self.lock_state()?;
        let mut wait_started: Option<Instant> = None;

        loop {
            if state.closed {
                return Err(StoreError::PoolClosed);
            }

            while let Some(idle) = state.idle.pop() {
                match self.expiry(&idle) {
                    None => {
                        self.counters.in_use.fetch_add(1, Ordering::Relaxed);
                        self.record_wait(wait_started);
                        return Ok(PooledConnection::new(self, idle.conn, idle.created_at));
                    }
                    Some(reason) => {
                        self.forget_locked(&mut state);
                        match reason {
                            Expiry::Lifetime => {
                                self.counters.lifetime_closed.fetch_add(1, Ordering::Relaxed)
                            }
                            Expiry::IdleTime => {
                                self.counters.idle_closed.fetch_add(1, Ordering::Relaxed)
                            }
                        };
                        debug!("closing expired idle connection");
                    }
                }
            }

            if state.open < self.max_conns {
                state.open += 1;
                self.counters.open.store(state.open, Ordering::Relaxed);
                self.counters.in_use.fetch_add(1, Ordering::Relaxed);
                drop(state);
                self.record_wait(wait_started);

                return match self.connect() {
                    Ok(conn) => Ok(PooledConnection::new(self, conn, Instant::now())),
                    Err(e) => {
                        self.counters.in_use.fetch_sub(1, Ordering::Relaxed);
                        let mut state = self.lock_state()?;
                        self.forget_locked(&mut state);
                        self.available.notify_one();
                        Err(e)
                    }
                };
            }

            let started = *wait_started.get_or_insert_with(Instant::now);
            if let Err(e) = ctx.check() {
                self.record_wait(Some(started));
                return Err(match e {
                    StoreError::DeadlineExceeded => StoreError::PoolTimeout {
                        in_use: self.counters.in_use.load(Ordering::Relaxed),
                        max_conns: self.max_conns,
                    },
                    other => other,
                });
            }

            let slice = ctx.remaining().map_or(WAIT_SLICE, |r| r.min(WAIT_SLICE));
            let (guard, _) = self
                .available
                .wait_timeout(state, slice)
                .map_err(|_| StoreError::LockPoisoned)?;
            state = guard;
        }
    }

    /// Begin a transaction on a dedicated connection.
    pub fn begin(&self, ctx: &Context) -> StoreResult<Transaction<'_>> {
        let conn = self.acquire(ctx)?;
        executor::guarded(&conn, ctx, |c| {
            c.execute_batch("BEGIN")?;
            Ok(())
        })?;
        Ok(Transaction::new(conn))
    }

    /// Liveness: a connection can be checked out and reads the database header.
    pub fn ping(&self, ctx: &Context) -> StoreResult<()> {
        self.with_conn(ctx, |conn| {
            conn.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    /// Ping plus a trivial round-trip query. Either failing reports unhealthy.
    pub fn health_check(&self, ctx: &Context) -> bool {
        if let Err(e) = self.ping(ctx) {
            debug!(error = %e, "health check ping failed");
            return false;
        }
        match self.query_row(ctx, "SELECT 1", [], |row| row.get::<_, i64>(0)) {
            Ok(1) => true,
            Ok(other) => {
                debug!(result = other, "health check query returned unexpected value");
                false
            }
            Err(e) => {
                debug!(error = %e, "health check query failed");
                false
            }
        }
    }

    /// Lock-free snapshot of pool occupancy.
    pub fn stats(&self) -> PoolStats {
        let open = self.counters.open.load(Ordering::Relaxed);
        let in_use = self.counters.in_use.load(Ordering::Relaxed);
        PoolStats {
            max_conns: self.max_conns,
            open_conns: open,
            in_use,
            idle: open.saturating_sub(in_use),
            wait_count: self.counters.wait_count.load(Ordering::Relaxed),
            wait_duration: Duration::from_nanos(self.counters.wait_ns.load(Ordering::Relaxed)),
            max_lifetime_closed: self.counters.lifetime_closed.load(Ordering::Relaxed),
            max_idle_time_closed: self.counters.idle_closed.load(Ordering::Relaxed),
        }
    }

    /// Drop cached prepared statements on every idle connection.
    pub fn flush_statement_cache(&self) {
        let state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        for idle in &state.idle {
            idle.conn.flush_prepared_statement_cache();
        }
    }

    /// Close idle connections and refuse further checkouts. Connections still
    /// in use are closed when returned.
    pub fn close(&self) {
        let drained = {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            if state.closed {
                return;
            }
            state.closed = true;
            let drained = std::mem::take(&mut state.idle);
            state.open -= drained.len();
            self.counters.open.store(state.open, Ordering::Relaxed);
            drained
        };
        self.available.notify_all();
        info!(closed_idle = drained.len(), "connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        match self.state.lock() {
            Ok(state) => state.closed,
            Err(poisoned) => poisoned.into_inner().closed,
        }
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    fn lock_state(&self) -> StoreResult<MutexGuard<'_, PoolState>> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn connect(&self) -> StoreResult<Connection> {
        let path = &self.config.path;
        let conn = Connection::open(path).map_err(|source| StoreError::Connect {
            path: path.clone(),
            source,
        })?;
        pragmas::configure_connection(&conn, self.busy_timeout).map_err(
            |source| StoreError::Connect {
                path: path.clone(),
                source,
            },
        )?;
        conn.set_prepared_statement_cache_capacity(self.config.effective_statement_cache_capacity());
        debug!(path = %path.display(), "opened pooled connection");
        Ok(conn)
    }

    fn expiry(&self, idle: &IdleConn) -> Option<Expiry> {
        if idle.created_at.elapsed() >= self.max_lifetime {
            Some(Expiry::Lifetime)
        } else if idle.returned_at.elapsed() >= self.max_idle_time {
            Some(Expiry::IdleTime)
        } else {
            None
        }
    }

    fn forget_locked(&self, state: &mut PoolState) {
        state.open = state.open.saturating_sub(1);
        self.counters.open.store(state.open, Ordering::Relaxed);
    }

    fn record_wait(&self, wait_started: Option<Instant>) {
        if let Some(started) = wait_started {
            let waited = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
            self.counters.wait_count.fetch_add(1, Ordering::Relaxed);
            self.counters.wait_ns.fetch_add(waited, Ordering::Relaxed);
        }
    }

    /// Return a checked-out connection. Closes it instead when the pool is
    /// closed, the connection is too old or left mid-transaction, or the idle
    /// set is full.
    fn release(&self, conn: Connection, created_at: Instant) {
        self.counters.in_use.fetch_sub(1, Ordering::Relaxed);

        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let expired = created_at.elapsed() >= self.max_lifetime;
        let reusable = !state.closed
            && !expired
            && conn.is_autocommit()
            && state.idle.len() < self.max_idle;

        if reusable {
            state.idle.push(IdleConn {
                conn,
                created_at,
                returned_at: Instant::now(),
            });
            drop(state);
        } else {
            self.forget_locked(&mut state);
            drop(state);
            if expired {
                self.counters.lifetime_closed.fetch_add(1, Ordering::Relaxed);
            }
            drop(conn);
        }
        self.available.notify_one();
    }
}

impl Executor for ConnectionPool {
    fn with_conn<T, F>(&self, ctx: &Context, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self.acquire(ctx)?;
        executor::guarded(&conn, ctx, f)
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("path", &self.config.path)
            .field("max_conns", &self.max_conns)
            .field("max_idle", &self.max_idle)
            .finish_non_exhaustive()
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.close();
    }
}
