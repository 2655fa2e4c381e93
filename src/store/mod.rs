//! # Hot-list Ranking Store
//!
//! Persists successive ranked snapshots of "hot" lists per platform, tracks how
//! each item's rank and popularity moved between observations, and answers
//! windowed analytical queries.
//!
//! ## Architecture
//!
//! ```text
//! Fetcher (external) → HotStore::ingest_batch
//!     ├─ hotsearch_raw      (one row per item per collection, retries skipped)
//!     └─ ranking_history    (append-only, changes vs. previous observation)
//!
//! HotStore::record_details → item_details (independent cadence)
//!
//! AnalyticsReader (query_only connection, any number in parallel)
//!     ├─ item_history / trending_topics / fastest_rising / statistics
//!     └─ write_history_csv / export_history_csv
//! ```
//!
//! ## Schema Reference
//!
//! SQL files in `/sql/` are embedded and applied on open (see `schema`).
//! `cross_platform` is created but nothing writes to it.
//!
//! ## Module Organization
//!
//! - `types` - Input items, history rows, query results
//! - `changes` - Previous-observation lookup and change arithmetic
//! - `writer` - `SnapshotWriter` trait and the SQLite `HotStore`
//! - `reader` - Read-only `AnalyticsReader`
//! - `export` - CSV export of the ranking history
//! - `schema` - Embedded migrations
//! - `error` - Error types

pub mod changes;
pub mod error;
pub mod export;
pub mod reader;
pub mod schema;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use error::{ExportError, QueryError, StoreError};
pub use export::ExportFilter;
pub use reader::AnalyticsReader;
pub use types::{
    DetailCounters, FailureKind, FetchedItem, IngestReport, ItemFailure, RankChanges,
    RankingHistoryEntry, StoreStatistics, TrendingTopic,
};
pub use writer::{HotStore, SnapshotWriter};
