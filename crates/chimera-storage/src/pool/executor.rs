//! `Executor` — the query/exec surface shared by the pool and transactions.

use std::os::raw::c_int;

use rusqlite::{Connection, ErrorCode, Params, Row};
use tracing::warn;

use chimera_core::errors::{StoreError, StoreResult};

use super::connection::PooledConnection;
use crate::context::Context;

/// SQLite VM instructions between context checks while a statement runs.
const PROGRESS_OPS: c_int = 1000;

/// Context-scoped statement execution.
///
/// Implementors supply `with_conn`; `exec`, `query`, and `query_row` are
/// built on it. Statements go through the connection's prepared-statement
/// cache.
pub trait Executor {
    /// Run `f` on a connection while `ctx` is live. A statement still running
    /// when `ctx` expires or is cancelled is interrupted.
    fn with_conn<T, F>(&self, ctx: &Context, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>;

    /// Execute a statement that returns no rows. Returns the affected row count.
    fn exec<P: Params>(&self, ctx: &Context, sql: &str, params: P) -> StoreResult<usize> {
        self.with_conn(ctx, |conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            Ok(stmt.execute(params)?)
        })
    }

    /// Run a query and map every row.
    fn query<T, P, F>(&self, ctx: &Context, sql: &str, params: P, map: F) -> StoreResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.with_conn(ctx, |conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt
                .query_map(params, map)?
                .collect::<rusqlite::Result<Vec<T>>>()?;
            Ok(rows)
        })
    }

    /// Run a query expected to return at least one row; maps the first.
    fn query_row<T, P, F>(&self, ctx: &Context, sql: &str, params: P, map: F) -> StoreResult<T>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.with_conn(ctx, |conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            Ok(stmt.query_row(params, map)?)
        })
    }
}

/// Run `f` on `conn` with `ctx` watched by a progress handler.
///
/// The progress handler does not fire while SQLite sleeps on a lock, so the
/// busy timeout is also capped at the time `ctx` has left and restored after.
pub(crate) fn guarded<T, F>(conn: &PooledConnection<'_>, ctx: &Context, f: F) -> StoreResult<T>
where
    F: FnOnce(&Connection) -> StoreResult<T>,
{
    ctx.check()?;

    let raw: &Connection = conn;
    let configured = conn.configured_busy_timeout();
    let capped = ctx.remaining().filter(|left| *left < configured);
    if let Some(left) = capped {
        raw.busy_timeout(left)?;
    }

    let watch = ctx.clone();
    raw.progress_handler(PROGRESS_OPS, Some(move || watch.is_done()));
    let result = f(raw);
    raw.progress_handler(0, None::<fn() -> bool>);

    if capped.is_some() {
        if let Err(e) = raw.busy_timeout(configured) {
            warn!(error = %e, "failed to restore busy timeout");
        }
    }

    result.map_err(|err| match classify(&err) {
        Some(Halt::Interrupted) => ctx.check().err().unwrap_or(err),
        // A lock wait cut short by the context is a deadline, even when it
        // gave up a moment before the deadline itself.
        Some(Halt::Busy) if capped.is_some() => {
            ctx.check().err().unwrap_or(StoreError::DeadlineExceeded)
        }
        _ => err,
    })
}

enum Halt {
    Interrupted,
    Busy,
}

fn classify(err: &StoreError) -> Option<Halt> {
    match err {
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => match e.code {
            ErrorCode::OperationInterrupted => Some(Halt::Interrupted),
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => Some(Halt::Busy),
            _ => None,
        },
        _ => None,
    }
}
