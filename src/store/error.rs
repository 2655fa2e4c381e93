//! Error types for the ranking store

use super::types::IngestReport;
use thiserror::Error;

/// Failures that make the store itself unusable for a call
///
/// Surfaced to the caller as-is; the store never retries internally.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema migration {file} failed: {source}")]
    Migration {
        file: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("writer connection lock poisoned")]
    Poisoned,

    /// A batch stopped because the next item's transaction could not start
    ///
    /// `report` covers the items handled before the failure; those stay
    /// committed.
    #[error("batch for {} interrupted at rank {rank}: {source}", .report.platform)]
    Interrupted {
        report: Box<IngestReport>,
        rank: i64,
        #[source]
        source: rusqlite::Error,
    },
}

/// Failures of read-only analytics queries
///
/// An empty result is never used to signal one of these.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid argument {name}={value}: {reason}")]
    InvalidArgument {
        name: &'static str,
        value: i64,
        reason: &'static str,
    },

    #[error("query failed: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Per-item ingestion failure; recorded in the batch report, never returned
#[derive(Debug, Error)]
pub(crate) enum ItemError {
    #[error("malformed item: {0}")]
    Malformed(&'static str),

    #[error("payload not serializable: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Failures of the CSV exporter
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid date range: {start} is after {end}")]
    InvalidRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("export query failed: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
