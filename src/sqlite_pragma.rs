//! Shared SQLite PRAGMA setup
//!
//! Writer connections get the full set (WAL, NORMAL, MEMORY, mmap, cache,
//! autocheckpoint). Reader connections skip everything that needs a write lock
//! and are switched to `query_only`.

use rusqlite::Connection;
use std::time::Duration;

/// WAL pages before an automatic checkpoint
pub const WAL_AUTOCHECKPOINT_PAGES: i64 = 1000;

/// Apply optimized PRAGMAs for a writer connection
///
/// `journal_mode` stays `memory` for in-memory databases; SQLite ignores the
/// WAL request there.
pub fn apply_optimized_pragmas(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;
         PRAGMA cache_size = -32000;
         PRAGMA mmap_size = 134217728;",
    )?;
    conn.execute_batch(&format!(
        "PRAGMA wal_autocheckpoint = {};",
        WAL_AUTOCHECKPOINT_PAGES
    ))?;

    Ok(())
}

/// Apply PRAGMAs for a read-only analytics connection
///
/// Must run before any query. `query_only` is set last so the other PRAGMAs
/// still apply.
pub fn apply_reader_pragmas(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;

    conn.execute_batch(
        "PRAGMA temp_store = MEMORY;
         PRAGMA cache_size = -16000;
         PRAGMA mmap_size = 134217728;
         PRAGMA query_only = ON;",
    )?;

    Ok(())
}
