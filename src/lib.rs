//! hotrank - time-series store for ranked "hot" lists
//!
//! See `store` for the architecture overview.

pub mod config;
pub mod loader;
pub mod sqlite_pragma;
pub mod store;

pub use config::StoreConfig;
pub use loader::{CrawlSnapshot, SourceBatch};
pub use store::{
    AnalyticsReader, DetailCounters, ExportFilter, FetchedItem, HotStore, IngestReport,
    SnapshotWriter,
};
