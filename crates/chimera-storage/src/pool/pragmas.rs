//! SQLite PRAGMA configuration for pooled connections.
//!
//! Must be called on every connection immediately after opening.

use std::time::Duration;

use rusqlite::Connection;

/// Configure a pooled connection.
///
/// The busy timeout goes first: switching to WAL needs a lock that other
/// freshly opened pool connections may be holding.
pub fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -8000;
        PRAGMA temp_store = MEMORY;
        ",
    )?;
    Ok(())
}
