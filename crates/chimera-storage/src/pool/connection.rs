//! `PooledConnection` — a checked-out connection returned to its pool on drop.

use std::fmt;
use std::ops::Deref;
use std::time::{Duration, Instant};

use rusqlite::Connection;

use super::ConnectionPool;

pub struct PooledConnection<'p> {
    pool: &'p ConnectionPool,
    conn: Option<Connection>,
    created_at: Instant,
}

impl<'p> PooledConnection<'p> {
    pub(super) fn new(pool: &'p ConnectionPool, conn: Connection, created_at: Instant) -> Self {
        Self {
            pool,
            conn: Some(conn),
            created_at,
        }
    }

    /// The busy timeout every pooled connection is configured with.
    pub(super) fn configured_busy_timeout(&self) -> Duration {
        self.pool.busy_timeout
    }

    /// When the underlying connection was opened.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}

impl fmt::Debug for PooledConnection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("age", &self.created_at.elapsed())
            .finish_non_exhaustive()
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("pooled connection is present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.created_at);
        }
    }
}
