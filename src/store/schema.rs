//! Schema migrations, applied on open
//!
//! SQL lives in `/sql/` as numbered files and is embedded at compile time, so a
//! store can be opened from any working directory. Every file uses
//! `IF NOT EXISTS` and is safe to re-run; `PRAGMA user_version` records how many
//! files have been applied so an up-to-date database skips them entirely.

use super::error::StoreError;
use rusqlite::Connection;

/// Ordered migrations: (file name, SQL)
const MIGRATIONS: &[(&str, &str)] = &[
    ("00_hotsearch_raw.sql", include_str!("../../sql/00_hotsearch_raw.sql")),
    ("01_ranking_history.sql", include_str!("../../sql/01_ranking_history.sql")),
    ("02_item_details.sql", include_str!("../../sql/02_item_details.sql")),
    ("03_cross_platform.sql", include_str!("../../sql/03_cross_platform.sql")),
];

/// Schema version of a fully migrated database
pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

/// Current `user_version` of the database
pub fn schema_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

/// Run pending schema migrations
///
/// Each file runs in its own transaction together with the version bump, so a
/// failed migration leaves the database at the previous version.
pub fn run_schema_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let current = schema_version(conn)?;

    if current >= SCHEMA_VERSION {
        log::debug!("Schema up to date (version {})", current);
        return Ok(());
    }

    log::info!(
        "🔧 Running schema migrations: version {} -> {}",
        current,
        SCHEMA_VERSION
    );

    for (index, &(file, sql)) in MIGRATIONS.iter().enumerate().skip(current.max(0) as usize) {
        log::info!("   ├─ Executing: {}", file);

        let tx = conn.transaction()?;
        tx.execute_batch(sql)
            .map_err(|source| StoreError::Migration { file, source })?;
        tx.pragma_update(None, "user_version", (index + 1) as i64)?;
        tx.commit()?;

        log::info!("   └─ ✅ Success: {}", file);
    }

    log::info!("✅ All schema migrations completed successfully");

    Ok(())
}
