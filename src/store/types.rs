//! Core data structures for ranking snapshots, history rows and query results

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One ranked item as handed over by a fetcher
///
/// Rank is not part of the item: it is the item's 1-based position in the
/// batch passed to ingestion.
///
/// Field names follow the crawl payload keys (`desc`, `hot`, `mobileUrl`).
/// Deserialization is lenient so a single odd field never shifts the ranks of
/// the items behind it; validation happens at ingestion time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchedItem {
    /// Source-local item identifier (numeric ids are accepted and stringified)
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,

    #[serde(default, rename = "desc", deserialize_with = "lenient::opt_string")]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub author: Option<String>,

    /// Popularity score in source-defined units
    ///
    /// A missing or null score reads as `Some(0)`; `None` means the source
    /// sent something that is not a number.
    #[serde(
        default = "lenient::zero_popularity",
        rename = "hot",
        deserialize_with = "lenient::popularity"
    )]
    pub popularity: Option<i64>,

    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,

    #[serde(default, rename = "mobileUrl", deserialize_with = "lenient::opt_string")]
    pub mobile_url: Option<String>,

    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub cover: Option<String>,

    /// Source-reported timestamp, stored as given
    #[serde(default, deserialize_with = "lenient::int")]
    pub timestamp: i64,

    /// Original payload, preserved verbatim in `data_json`
    #[serde(skip)]
    pub payload: Value,
}

impl FetchedItem {
    /// Build an item from a raw crawl payload, keeping the payload verbatim
    ///
    /// Never fails: a payload that is not an object yields an item with an
    /// empty title, which ingestion then rejects as malformed.
    pub fn from_payload(payload: Value) -> Self {
        let mut item: FetchedItem = serde_json::from_value(payload.clone()).unwrap_or_default();
        item.payload = payload;
        item
    }

    /// JSON text stored alongside the raw snapshot
    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        if self.payload.is_null() {
            serde_json::to_string(self)
        } else {
            serde_json::to_string(&self.payload)
        }
    }
}

/// Changes relative to the previous observation of the same item
///
/// All fields are `None` for a first observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RankChanges {
    /// `previous_rank - current_rank`; positive means the item climbed
    pub rank_change: Option<i64>,
    /// `current_popularity - previous_popularity`
    pub hot_change: Option<i64>,
    /// Popularity growth in percent, `0.0` when the previous popularity was zero
    pub hot_growth_rate: Option<f64>,
}

impl RankChanges {
    pub fn is_first_observation(&self) -> bool {
        self.rank_change.is_none() && self.hot_change.is_none() && self.hot_growth_rate.is_none()
    }
}

/// One row of the `ranking_history` time series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingHistoryEntry {
    pub id: i64,
    pub platform: String,
    pub item_id: String,
    pub title: String,
    pub rank_position: i64,
    pub hot: i64,
    /// Collection instant (Unix seconds)
    pub collected_at: i64,
    #[serde(flatten)]
    pub changes: RankChanges,
}

/// An item that stayed on a source's list for a sustained period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendingTopic {
    pub item_id: String,
    pub title: String,
    pub appearances: i64,
    pub best_rank: i64,
    pub max_hot: i64,
    pub avg_hot: f64,
    pub first_seen: i64,
    pub last_seen: i64,
}

/// Row counts and time bounds of the store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStatistics {
    pub total_records: i64,
    pub history_records: i64,
    pub earliest_record: Option<i64>,
    pub latest_record: Option<i64>,
    /// Only computed when no source filter is applied
    pub platform_count: Option<i64>,
    pub details_count: i64,
}

/// Engagement counters for one item
///
/// Deserializes from the detail payload keys (`view`, `like`, `reply`,
/// `share`, `favorite`, `coin`, `danmaku`); missing counters are 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailCounters {
    #[serde(default, rename = "view", deserialize_with = "lenient::int")]
    pub view_count: i64,
    #[serde(default, rename = "like", deserialize_with = "lenient::int")]
    pub like_count: i64,
    #[serde(default, rename = "reply", deserialize_with = "lenient::int")]
    pub comment_count: i64,
    #[serde(default, rename = "share", deserialize_with = "lenient::int")]
    pub share_count: i64,
    #[serde(default, rename = "favorite", deserialize_with = "lenient::int")]
    pub favorite_count: i64,
    #[serde(default, rename = "coin", deserialize_with = "lenient::int")]
    pub coin_count: i64,
    #[serde(default, rename = "danmaku", deserialize_with = "lenient::int")]
    pub danmaku_count: i64,

    #[serde(skip)]
    pub payload: Value,
}

impl DetailCounters {
    pub fn from_payload(payload: Value) -> Self {
        let mut counters: DetailCounters =
            serde_json::from_value(payload.clone()).unwrap_or_default();
        counters.payload = payload;
        counters
    }

    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        if self.payload.is_null() {
            serde_json::to_string(self)
        } else {
            serde_json::to_string(&self.payload)
        }
    }
}

/// Why a single item was not recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    Malformed,
    Storage,
}

/// A per-item failure inside an otherwise successful batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub rank: i64,
    pub item_id: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Outcome of one ingestion batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub platform: String,
    pub collected_at: i64,
    /// Newly inserted raw snapshots
    pub inserted: usize,
    /// Raw snapshots skipped because the same observation already exists
    pub duplicates: usize,
    /// Ranking history rows appended
    pub history_rows: usize,
    pub failures: Vec<ItemFailure>,
}

impl IngestReport {
    pub fn new(platform: &str, collected_at: i64) -> Self {
        Self {
            platform: platform.to_string(),
            collected_at,
            ..Default::default()
        }
    }

    /// Number of items handed to the batch
    pub fn attempted(&self) -> usize {
        self.history_rows + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Deserializers that never reject a field for having an unexpected type
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn zero_popularity() -> Option<i64> {
        Some(0)
    }

    fn value_to_string(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn value_to_int(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            _ => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(value_to_string(Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(value_to_string(Value::deserialize(d)?).filter(|s| !s.is_empty()))
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        Ok(value_to_int(&Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn popularity<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        let value = Value::deserialize(d)?;
        if value.is_null() {
            return Ok(Some(0));
        }
        Ok(value_to_int(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fetched_item_from_crawl_payload() {
        let payload = json!({
            "id": 4521,
            "title": "Launch day",
            "desc": "",
            "hot": "98765",
            "url": "https://example.com/a",
            "mobileUrl": "https://m.example.com/a",
            "timestamp": 1700000000,
            "extra": {"label": "new"}
        });

        let item = FetchedItem::from_payload(payload.clone());

        assert_eq!(item.id, "4521");
        assert_eq!(item.title, "Launch day");
        assert_eq!(item.description, None);
        assert_eq!(item.popularity, Some(98_765));
        assert_eq!(item.mobile_url.as_deref(), Some("https://m.example.com/a"));
        assert_eq!(item.cover, None);
        assert_eq!(item.timestamp, 1_700_000_000);

        // Unknown fields survive in the stored payload
        let stored: Value = serde_json::from_str(&item.payload_json().unwrap()).unwrap();
        assert_eq!(stored, payload);
    }

    #[test]
    fn test_popularity_missing_null_and_garbage() {
        let missing = FetchedItem::from_payload(json!({"id": "a", "title": "t"}));
        assert_eq!(missing.popularity, Some(0));

        let null = FetchedItem::from_payload(json!({"id": "a", "title": "t", "hot": null}));
        assert_eq!(null.popularity, Some(0));

        let garbage = FetchedItem::from_payload(json!({"id": "a", "title": "t", "hot": "hot!"}));
        assert_eq!(garbage.popularity, None);

        let float = FetchedItem::from_payload(json!({"id": "a", "title": "t", "hot": 12.9}));
        assert_eq!(float.popularity, Some(12));
    }

    #[test]
    fn test_non_object_payload_yields_empty_item() {
        let item = FetchedItem::from_payload(json!(["not", "an", "object"]));
        assert!(item.title.is_empty());
        assert!(item.id.is_empty());
    }

    #[test]
    fn test_detail_counters_from_payload() {
        let counters = DetailCounters::from_payload(json!({
            "view": 1200,
            "like": "35",
            "reply": 7,
            "coin": null
        }));

        assert_eq!(counters.view_count, 1200);
        assert_eq!(counters.like_count, 35);
        assert_eq!(counters.comment_count, 7);
        assert_eq!(counters.coin_count, 0);
        assert_eq!(counters.danmaku_count, 0);
    }

    #[test]
    fn test_history_entry_serializes_flat() {
        let entry = RankingHistoryEntry {
            id: 1,
            platform: "weibo".to_string(),
            item_id: "a".to_string(),
            title: "t".to_string(),
            rank_position: 2,
            hot: 10,
            collected_at: 1_700_000_000,
            changes: RankChanges {
                rank_change: Some(1),
                hot_change: Some(5),
                hot_growth_rate: Some(100.0),
            },
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["rank_change"], 1);
        assert_eq!(value["hot_growth_rate"], 100.0);
        assert!(value.get("changes").is_none());
    }
}
