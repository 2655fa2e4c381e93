//! Ranking snapshot writer
//!
//! Owns the single writer connection. Ingestion and detail recording are
//! serialized through its mutex; every item is read-prior-then-insert inside
//! one IMMEDIATE transaction, so concurrent ingestions of the same item cannot
//! both derive changes from the same previous row.

use super::changes::compute_changes;
use super::error::{ItemError, StoreError};
use super::reader::AnalyticsReader;
use super::schema::run_schema_migrations;
use super::types::{DetailCounters, FailureKind, FetchedItem, IngestReport, ItemFailure};
use crate::config::StoreConfig;
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Trait for writing ranking snapshots and detail counters
///
/// Tables written (see `/sql/` directory):
/// - `hotsearch_raw` - INSERT, duplicate observations skipped
/// - `ranking_history` - INSERT (append-only, changes computed per item)
/// - `item_details` - INSERT (append-only, no change computation)
#[async_trait]
pub trait SnapshotWriter: Send + Sync {
    /// Write one ranked list for `platform`, observed at `collected_at`
    ///
    /// Rank is the 1-based position in `items`. Bad items are reported in the
    /// returned `IngestReport` and never abort the batch.
    async fn write_batch(
        &self,
        platform: &str,
        collected_at: i64,
        items: Vec<FetchedItem>,
    ) -> Result<IngestReport, StoreError>;

    /// Write detail counters for one item; `false` on failure
    async fn write_details(&self, platform: &str, item_id: &str, counters: DetailCounters) -> bool;
}

/// SQLite implementation of `SnapshotWriter`
pub struct HotStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl HotStore {
    /// Open the store configured by `config`
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::open_path(&config.db_path, config.busy_timeout())
    }

    /// Open (or create) a store at `db_path`
    ///
    /// Creates the parent directory and applies pending schema migrations.
    pub fn open_path(db_path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn, busy_timeout)?;
        run_schema_migrations(&mut conn)?;

        log::info!("✅ Ranking store opened: {}", db_path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: db_path.to_path_buf(),
            busy_timeout,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a read-only analytics connection on the same database file
    pub fn reader(&self) -> Result<AnalyticsReader, StoreError> {
        AnalyticsReader::open(&self.db_path, self.busy_timeout)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Ingest one ranked list for `platform`, observed at `collected_at`
    ///
    /// Each item commits in its own transaction, so items accepted before a
    /// failure stay visible. When the next item's transaction cannot be
    /// started the call fails with `StoreError::Interrupted`, which still
    /// carries the report for the items handled so far.
    pub fn ingest_batch(
        &self,
        platform: &str,
        collected_at: i64,
        items: &[FetchedItem],
    ) -> Result<IngestReport, StoreError> {
        let mut conn = self.lock()?;
        let mut report = IngestReport::new(platform, collected_at);

        for (index, item) in items.iter().enumerate() {
            let rank = index as i64 + 1;

            let tx = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
                Ok(tx) => tx,
                Err(source) => {
                    log::error!(
                        "❌ Batch {} interrupted at rank {} after {} items: {}",
                        platform,
                        rank,
                        report.attempted(),
                        source
                    );
                    return Err(StoreError::Interrupted {
                        report: Box::new(report),
                        rank,
                        source,
                    });
                }
            };
            let outcome = ingest_item(&tx, platform, collected_at, rank, item)
                .and_then(|inserted| tx.commit().map(|_| inserted).map_err(ItemError::from));

            match outcome {
                Ok(true) => {
                    report.inserted += 1;
                    report.history_rows += 1;
                }
                Ok(false) => {
                    log::debug!(
                        "⏭️  Observation already stored, skipping raw row: {} #{} {}",
                        platform,
                        rank,
                        item.title
                    );
                    report.duplicates += 1;
                    report.history_rows += 1;
                }
                Err(e) => {
                    // Uncommitted transaction is rolled back on drop
                    log::warn!("⚠️  Skipped item {} #{} ({}): {}", platform, rank, item.id, e);
                    report.failures.push(ItemFailure {
                        rank,
                        item_id: item.id.clone(),
                        kind: match e {
                            ItemError::Malformed(_) => FailureKind::Malformed,
                            ItemError::Payload(_) | ItemError::Storage(_) => FailureKind::Storage,
                        },
                        reason: e.to_string(),
                    });
                }
            }
        }

        log::info!(
            "📊 Ingested {}/{} items [{}] ({} duplicates, {} failed)",
            report.inserted,
            items.len(),
            platform,
            report.duplicates,
            report.failures.len()
        );

        Ok(report)
    }

    /// Record detail counters collected now
    pub fn record_details(&self, platform: &str, item_id: &str, counters: &DetailCounters) -> bool {
        self.record_details_at(platform, item_id, counters, chrono::Utc::now().timestamp())
    }

    /// Record detail counters for an explicit collection instant
    ///
    /// Failures are logged and reported as `false`; they never affect ranking
    /// ingestion.
    pub fn record_details_at(
        &self,
        platform: &str,
        item_id: &str,
        counters: &DetailCounters,
        collected_at: i64,
    ) -> bool {
        match self.insert_details(platform, item_id, counters, collected_at) {
            Ok(()) => true,
            Err(e) => {
                log::error!("❌ Failed to record details for {} {}: {}", platform, item_id, e);
                false
            }
        }
    }

    fn insert_details(
        &self,
        platform: &str,
        item_id: &str,
        counters: &DetailCounters,
        collected_at: i64,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let details_json = counters.payload_json()?;
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO item_details (
                platform, item_id, view_count, like_count, comment_count,
                share_count, favorite_count, coin_count, danmaku_count,
                collected_at, details_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                platform,
                item_id,
                counters.view_count,
                counters.like_count,
                counters.comment_count,
                counters.share_count,
                counters.favorite_count,
                counters.coin_count,
                counters.danmaku_count,
                collected_at,
                details_json,
            ],
        )?;

        Ok(())
    }
}

#[async_trait]
impl SnapshotWriter for HotStore {
    async fn write_batch(
        &self,
        platform: &str,
        collected_at: i64,
        items: Vec<FetchedItem>,
    ) -> Result<IngestReport, StoreError> {
        self.ingest_batch(platform, collected_at, &items)
    }

    async fn write_details(&self, platform: &str, item_id: &str, counters: DetailCounters) -> bool {
        self.record_details(platform, item_id, &counters)
    }
}

/// Check required fields; returns the popularity to store
fn validate_item(item: &FetchedItem) -> Result<i64, ItemError> {
    if item.title.trim().is_empty() {
        return Err(ItemError::Malformed("missing title"));
    }
    match item.popularity {
        None => Err(ItemError::Malformed("unreadable popularity")),
        Some(hot) if hot < 0 => Err(ItemError::Malformed("negative popularity")),
        Some(hot) => Ok(hot),
    }
}

/// Insert raw snapshot and history row for one item
///
/// Returns whether the raw snapshot was new. The history row is appended
/// either way.
fn ingest_item(
    tx: &Transaction<'_>,
    platform: &str,
    collected_at: i64,
    rank: i64,
    item: &FetchedItem,
) -> Result<bool, ItemError> {
    let hot = validate_item(item)?;
    let data_json = item.payload_json()?;

    let inserted = tx.execute(
        r#"
        INSERT INTO hotsearch_raw (
            platform, item_id, title, description, author, hot, url,
            mobile_url, cover, rank_position, timestamp, collected_at, data_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        ON CONFLICT(platform, item_id, collected_at) DO NOTHING
        "#,
        params![
            platform,
            item.id,
            item.title,
            item.description,
            item.author,
            hot,
            item.url,
            item.mobile_url,
            item.cover,
            rank,
            item.timestamp,
            collected_at,
            data_json,
        ],
    )? == 1;

    let changes = compute_changes(tx, platform, &item.id, rank, hot, collected_at)?;

    tx.execute(
        r#"
        INSERT INTO ranking_history (
            platform, item_id, title, rank_position, hot, collected_at,
            rank_change, hot_change, hot_growth_rate
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            platform,
            item.id,
            item.title,
            rank,
            hot,
            collected_at,
            changes.rank_change,
            changes.hot_change,
            changes.hot_growth_rate,
        ],
    )?;

    Ok(inserted)
}
