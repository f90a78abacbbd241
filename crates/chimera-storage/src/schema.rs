//! The persisted share row contract.

use chimera_core::errors::StoreResult;

use crate::context::Context;
use crate::pool::{ConnectionPool, Executor};

pub const SHARES_TABLE: &str = "shares";

/// Columns written by the share batch writer, in parameter order.
pub const SHARE_COLUMNS: [&str; 7] = [
    "miner_id",
    "user_id",
    "difficulty",
    "is_valid",
    "nonce",
    "hash",
    "timestamp",
];

pub const CREATE_SHARES_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS shares (
        id          INTEGER PRIMARY KEY,
        miner_id    INTEGER NOT NULL,
        user_id     INTEGER NOT NULL,
        difficulty  REAL    NOT NULL,
        is_valid    INTEGER NOT NULL,
        nonce       TEXT    NOT NULL,
        hash        TEXT    NOT NULL,
        timestamp   TEXT    NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_shares_user_time ON shares (user_id, timestamp);
    CREATE INDEX IF NOT EXISTS idx_shares_miner_time ON shares (miner_id, timestamp);
";

/// Create the shares table and its indexes if absent.
pub fn ensure_shares_table(pool: &ConnectionPool, ctx: &Context) -> StoreResult<()> {
    pool.with_conn(ctx, |conn| {
        conn.execute_batch(CREATE_SHARES_TABLE)?;
        Ok(())
    })
}
