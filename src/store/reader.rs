//! Read-only analytics over the ranking history
//!
//! Each reader owns its own connection in `query_only` mode, so any number of
//! readers can run next to the writer under WAL. Every query is a single
//! statement (or, for statistics, a single read transaction) and therefore
//! sees one consistent snapshot.

use super::error::{QueryError, StoreError};
use super::types::{RankChanges, RankingHistoryEntry, StoreStatistics, TrendingTopic};
use crate::sqlite_pragma::apply_reader_pragmas;
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::time::Duration;

/// Maximum number of trending topics returned
pub const TRENDING_LIMIT: i64 = 50;

const HISTORY_COLUMNS: &str = "id, platform, item_id, title, rank_position, hot, collected_at, \
                               rank_change, hot_change, hot_growth_rate";

/// SQLite analytics reader
pub struct AnalyticsReader {
    conn: Connection,
}

impl AnalyticsReader {
    /// Open a read-only connection on an existing store
    pub fn open(db_path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        apply_reader_pragmas(&conn, busy_timeout)?;
        Ok(Self { conn })
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// History of one item within the trailing `window_hours`, oldest first
    pub fn item_history(
        &self,
        platform: &str,
        item_id: &str,
        window_hours: i64,
    ) -> Result<Vec<RankingHistoryEntry>, QueryError> {
        let cutoff = window_cutoff(window_hours)?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}
             FROM ranking_history
             WHERE platform = ?1 AND item_id = ?2 AND collected_at >= ?3
             ORDER BY collected_at ASC, id ASC",
            HISTORY_COLUMNS
        ))?;

        let rows = stmt.query_map(params![platform, item_id, cutoff], history_entry_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Items seen at least `min_appearances` times within the trailing window
    ///
    /// Grouped by (item_id, title), ordered by peak popularity, at most
    /// `TRENDING_LIMIT` topics.
    pub fn trending_topics(
        &self,
        platform: &str,
        window_hours: i64,
        min_appearances: i64,
    ) -> Result<Vec<TrendingTopic>, QueryError> {
        let cutoff = window_cutoff(window_hours)?;
        require_positive("min_appearances", min_appearances)?;

        let mut stmt = self.conn.prepare(
            "SELECT item_id,
                    title,
                    COUNT(*) AS appearances,
                    MIN(rank_position) AS best_rank,
                    MAX(hot) AS max_hot,
                    AVG(hot) AS avg_hot,
                    MIN(collected_at) AS first_seen,
                    MAX(collected_at) AS last_seen
             FROM ranking_history
             WHERE platform = ?1 AND collected_at >= ?2
             GROUP BY item_id, title
             HAVING COUNT(*) >= ?3
             ORDER BY max_hot DESC, item_id ASC
             LIMIT ?4",
        )?;

        let rows = stmt.query_map(
            params![platform, cutoff, min_appearances, TRENDING_LIMIT],
            |row| {
                Ok(TrendingTopic {
                    item_id: row.get(0)?,
                    title: row.get(1)?,
                    appearances: row.get(2)?,
                    best_rank: row.get(3)?,
                    max_hot: row.get(4)?,
                    avg_hot: row.get(5)?,
                    first_seen: row.get(6)?,
                    last_seen: row.get(7)?,
                })
            },
        )?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Most recent climbs, biggest jump first within the same instant
    ///
    /// Only rows with a positive rank change are returned.
    pub fn fastest_rising(
        &self,
        platform: &str,
        limit: i64,
    ) -> Result<Vec<RankingHistoryEntry>, QueryError> {
        require_positive("limit", limit)?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}
             FROM ranking_history
             WHERE platform = ?1
               AND rank_change IS NOT NULL
               AND rank_change > 0
             ORDER BY collected_at DESC, rank_change DESC, id DESC
             LIMIT ?2",
            HISTORY_COLUMNS
        ))?;

        let rows = stmt.query_map(params![platform, limit], history_entry_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Row counts and collection time bounds, optionally for one platform
    pub fn statistics(&self, platform: Option<&str>) -> Result<StoreStatistics, QueryError> {
        let tx = self.conn.unchecked_transaction()?;

        let total_records: i64 = tx.query_row(
            "SELECT COUNT(*) FROM hotsearch_raw WHERE ?1 IS NULL OR platform = ?1",
            params![platform],
            |row| row.get(0),
        )?;

        let history_records: i64 = tx.query_row(
            "SELECT COUNT(*) FROM ranking_history WHERE ?1 IS NULL OR platform = ?1",
            params![platform],
            |row| row.get(0),
        )?;

        let (earliest_record, latest_record): (Option<i64>, Option<i64>) = tx.query_row(
            "SELECT MIN(collected_at), MAX(collected_at)
             FROM hotsearch_raw
             WHERE ?1 IS NULL OR platform = ?1",
            params![platform],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let platform_count = match platform {
            Some(_) => None,
            None => Some(tx.query_row(
                "SELECT COUNT(DISTINCT platform) FROM hotsearch_raw",
                [],
                |row| row.get(0),
            )?),
        };

        let details_count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM item_details WHERE ?1 IS NULL OR platform = ?1",
            params![platform],
            |row| row.get(0),
        )?;

        tx.commit()?;

        Ok(StoreStatistics {
            total_records,
            history_records,
            earliest_record,
            latest_record,
            platform_count,
            details_count,
        })
    }
}

fn require_positive(name: &'static str, value: i64) -> Result<(), QueryError> {
    if value < 1 {
        return Err(QueryError::InvalidArgument {
            name,
            value,
            reason: "must be at least 1",
        });
    }
    Ok(())
}

/// Earliest collection instant inside a trailing window ending now
fn window_cutoff(window_hours: i64) -> Result<i64, QueryError> {
    require_positive("window_hours", window_hours)?;

    window_hours
        .checked_mul(3600)
        .and_then(|secs| Utc::now().timestamp().checked_sub(secs))
        .ok_or(QueryError::InvalidArgument {
            name: "window_hours",
            value: window_hours,
            reason: "window out of range",
        })
}

fn history_entry_from_row(row: &Row<'_>) -> rusqlite::Result<RankingHistoryEntry> {
    Ok(RankingHistoryEntry {
        id: row.get(0)?,
        platform: row.get(1)?,
        item_id: row.get(2)?,
        title: row.get(3)?,
        rank_position: row.get(4)?,
        hot: row.get(5)?,
        collected_at: row.get(6)?,
        changes: RankChanges {
            rank_change: row.get(7)?,
            hot_change: row.get(8)?,
            hot_growth_rate: row.get(9)?,
        },
    })
}
