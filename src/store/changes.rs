//! Rank and popularity change calculation
//!
//! The lookup of the previous observation must run on the same transaction as
//! the history insert that follows it. Otherwise two ingestions of the same
//! item can both read the same "previous" row and write divergent changes.

use super::types::RankChanges;
use rusqlite::{params, Connection, OptionalExtension};

/// Rank and popularity of the latest earlier observation of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviousObservation {
    pub rank_position: i64,
    pub hot: i64,
}

/// Find the most recent history row for `(platform, item_id)` strictly before
/// `collected_at`
///
/// Equal instants resolve to the most recently inserted row.
pub fn previous_observation(
    conn: &Connection,
    platform: &str,
    item_id: &str,
    collected_at: i64,
) -> rusqlite::Result<Option<PreviousObservation>> {
    conn.query_row(
        "SELECT rank_position, hot
         FROM ranking_history
         WHERE platform = ?1 AND item_id = ?2 AND collected_at < ?3
         ORDER BY collected_at DESC, id DESC
         LIMIT 1",
        params![platform, item_id, collected_at],
        |row| {
            Ok(PreviousObservation {
                rank_position: row.get(0)?,
                hot: row.get(1)?,
            })
        },
    )
    .optional()
}

/// Derive changes from the previous observation
///
/// Growth rate is a percentage of the previous popularity and is `0.0` (not
/// `None`) when the previous popularity was zero.
pub fn derive_changes(
    previous: Option<PreviousObservation>,
    current_rank: i64,
    current_hot: i64,
) -> RankChanges {
    let Some(previous) = previous else {
        return RankChanges::default();
    };

    let rank_change = previous.rank_position - current_rank;
    let hot_change = current_hot - previous.hot;
    let hot_growth_rate = if previous.hot > 0 {
        hot_change as f64 / previous.hot as f64 * 100.0
    } else {
        0.0
    };

    RankChanges {
        rank_change: Some(rank_change),
        hot_change: Some(hot_change),
        hot_growth_rate: Some(hot_growth_rate),
    }
}

/// Look up the previous observation and derive changes against it
pub fn compute_changes(
    conn: &Connection,
    platform: &str,
    item_id: &str,
    current_rank: i64,
    current_hot: i64,
    collected_at: i64,
) -> rusqlite::Result<RankChanges> {
    let previous = previous_observation(conn, platform, item_id, collected_at)?;
    Ok(derive_changes(previous, current_rank, current_hot))
}
