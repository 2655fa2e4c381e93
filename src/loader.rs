//! Crawl snapshot loader
//!
//! Reads the JSON files a fetcher drops after each crawl:
//!
//! ```json
//! {
//!   "crawl_time": "2024-03-01T10:00:00.123456",
//!   "platforms": {
//!     "weibo": { "platform": "weibo", "timestamp": "2024-03-01T10:00:01", "data": [ ... ] }
//!   }
//! }
//! ```
//!
//! Items keep their list position, so a malformed entry still occupies its
//! rank and is rejected later by ingestion.

use crate::store::types::FetchedItem;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid snapshot json: {0}")]
    Json(#[from] serde_json::Error),
}

/// One crawl across all platforms
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlSnapshot {
    #[serde(default)]
    pub crawl_time: Option<String>,

    #[serde(default)]
    pub platforms: BTreeMap<String, PlatformPayload>,
}

/// One platform's list inside a crawl
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformPayload {
    #[serde(default)]
    pub timestamp: Option<String>,

    #[serde(default)]
    pub data: Vec<Value>,
}

/// Items of one platform, ready for ingestion
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub platform: String,
    pub collected_at: i64,
    pub items: Vec<FetchedItem>,
}

/// Parse a crawl timestamp into Unix seconds
///
/// Accepts RFC 3339 and naive ISO 8601 (interpreted as local time, which is
/// what the crawler writes).
pub fn parse_instant(text: &str) -> Option<i64> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp());
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|dt| dt.timestamp())
}

impl CrawlSnapshot {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoaderError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let snapshot = Self::from_json(&json)?;

        log::info!(
            "Loaded crawl snapshot {} ({} platforms)",
            path.display(),
            snapshot.platforms.len()
        );
        Ok(snapshot)
    }

    pub fn from_json(json: &str) -> Result<Self, LoaderError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Collection instant of the whole crawl, if recorded
    pub fn collected_at(&self) -> Option<i64> {
        self.crawl_time.as_deref().and_then(parse_instant)
    }

    /// Split into per-platform batches
    ///
    /// A platform's own timestamp wins over the crawl time; `fallback` is used
    /// when neither parses.
    pub fn into_batches(self, fallback: i64) -> Vec<SourceBatch> {
        let crawl_instant = self.collected_at();

        self.platforms
            .into_iter()
            .map(|(platform, payload)| {
                let collected_at = payload
                    .timestamp
                    .as_deref()
                    .and_then(parse_instant)
                    .or(crawl_instant)
                    .unwrap_or(fallback);

                SourceBatch {
                    platform,
                    collected_at,
                    items: payload.data.into_iter().map(FetchedItem::from_payload).collect(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "crawl_time": "2024-03-01T10:00:00+00:00",
        "platforms": {
            "weibo": {
                "platform": "weibo",
                "data": [
                    {"id": "w1", "title": "first", "hot": 900},
                    {"id": "w2", "title": "", "hot": 800},
                    {"id": "w3", "title": "third", "hot": null}
                ]
            },
            "bilibili": {
                "platform": "bilibili",
                "timestamp": "2024-03-01T10:00:30Z",
                "data": [{"id": 77, "title": "video", "hot": "12", "cover": "https://i.example/77.jpg"}]
            }
        }
    }"#;

    #[test]
    fn test_batches_keep_positions_and_instants() {
        let snapshot = CrawlSnapshot::from_json(SNAPSHOT).unwrap();
        let crawl = snapshot.collected_at().unwrap();
        let batches = snapshot.into_batches(0);

        assert_eq!(batches.len(), 2);

        // BTreeMap order
        let bilibili = &batches[0];
        assert_eq!(bilibili.platform, "bilibili");
        assert_eq!(bilibili.collected_at, crawl + 30);
        assert_eq!(bilibili.items[0].id, "77");
        assert_eq!(bilibili.items[0].popularity, Some(12));

        let weibo = &batches[1];
        assert_eq!(weibo.collected_at, crawl);
        assert_eq!(weibo.items.len(), 3);
        assert!(weibo.items[1].title.is_empty());
        assert_eq!(weibo.items[2].popularity, Some(0));
    }

    #[test]
    fn test_fallback_instant() {
        let snapshot = CrawlSnapshot::from_json(r#"{"platforms": {"x": {"data": []}}}"#).unwrap();
        assert_eq!(snapshot.collected_at(), None);

        let batches = snapshot.into_batches(1234);
        assert_eq!(batches[0].collected_at, 1234);
    }

    #[test]
    fn test_parse_instant_formats() {
        assert_eq!(parse_instant("2024-03-01T10:00:00Z"), Some(1_709_287_200));
        assert!(parse_instant("2024-03-01T10:00:00.123456").is_some());
        assert!(parse_instant("2024-03-01 10:00:00").is_some());
        assert_eq!(parse_instant("yesterday"), None);
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(matches!(
            CrawlSnapshot::from_json(r#"{"platforms": "#),
            Err(LoaderError::Json(_))
        ));
    }
}
