//! `Transaction` — a pooled connection pinned for BEGIN ... COMMIT/ROLLBACK.

use rusqlite::Connection;
use tracing::{debug, warn};

use chimera_core::errors::{StoreError, StoreResult};

use super::connection::PooledConnection;
use super::executor::{self, Executor};
use crate::context::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

/// An open transaction. Holds its connection until dropped.
///
/// `commit` and `rollback` end the transaction; calling either again is a
/// `TransactionDone` error. Dropping an active transaction rolls it back.
pub struct Transaction<'p> {
    conn: PooledConnection<'p>,
    state: TxState,
}

impl<'p> Transaction<'p> {
    pub(super) fn new(conn: PooledConnection<'p>) -> Self {
        Self {
            conn,
            state: TxState::Active,
        }
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TxState::Active
    }

    pub fn commit(&mut self, ctx: &Context) -> StoreResult<()> {
        self.ensure_active()?;
        let result = executor::guarded(&self.conn, ctx, |conn| {
            conn.execute_batch("COMMIT")?;
            Ok(())
        });
        match result {
            Ok(()) => {
                self.state = TxState::Committed;
                Ok(())
            }
            Err(e) => {
                // A failed commit still ends the transaction.
                self.rollback_quietly();
                Err(e)
            }
        }
    }

    pub fn rollback(&mut self, ctx: &Context) -> StoreResult<()> {
        self.ensure_active()?;
        let result = executor::guarded(&self.conn, ctx, |conn| {
            conn.execute_batch("ROLLBACK")?;
            Ok(())
        });
        if result.is_err() {
            self.rollback_quietly();
        }
        self.state = TxState::RolledBack;
        result
    }

    fn ensure_active(&self) -> StoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StoreError::TransactionDone)
        }
    }

    fn rollback_quietly(&mut self) {
        if !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "rollback after failed transaction end did not complete");
            }
        }
        self.state = TxState::RolledBack;
    }
}

impl Executor for Transaction<'_> {
    fn with_conn<T, F>(&self, ctx: &Context, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        self.ensure_active()?;
        executor::guarded(&self.conn, ctx, f)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.is_active() {
            debug!("transaction dropped while active, rolling back");
            self.rollback_quietly();
        }
    }
}
