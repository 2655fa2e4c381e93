//! Store configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the ranking store and its default query windows
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to SQLite database file
    pub db_path: PathBuf,

    /// How long a connection waits on a locked database (milliseconds)
    pub busy_timeout_ms: u64,

    /// Default trailing window for history and trending queries (hours)
    pub history_hours: i64,

    /// Default minimum appearances for a topic to count as trending
    pub min_appearances: i64,

    /// Default number of rows returned by the fastest-rising query
    pub rising_limit: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/hotsearch.db"),
            busy_timeout_ms: 5_000,
            history_hours: 24,
            min_appearances: 3,
            rising_limit: 10,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `HOTRANK_DB_PATH` (default: data/hotsearch.db)
    /// - `HOTRANK_BUSY_TIMEOUT_MS` (default: 5000)
    /// - `HOTRANK_HISTORY_HOURS` (default: 24)
    /// - `HOTRANK_MIN_APPEARANCES` (default: 3)
    /// - `HOTRANK_RISING_LIMIT` (default: 10)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Unparseable values fall back to the default for that key.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            db_path: lookup("HOTRANK_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),

            busy_timeout_ms: lookup("HOTRANK_BUSY_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.busy_timeout_ms),

            history_hours: lookup("HOTRANK_HISTORY_HOURS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.history_hours),

            min_appearances: lookup("HOTRANK_MIN_APPEARANCES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_appearances),

            rising_limit: lookup("HOTRANK_RISING_LIMIT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rising_limit),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
