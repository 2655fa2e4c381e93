//! hotrank - ingest crawl snapshots and query the ranking history
//!
//! ## Usage
//!
//! ```bash
//! hotrank ingest data/hotsearch_20240301_100000.json
//! hotrank stats [platform]
//! hotrank trending <platform> [hours] [min_appearances]
//! hotrank rising <platform> [limit]
//! hotrank history <platform> <item_id> [hours]
//! hotrank export <out.csv> [platform|-] [start YYYY-MM-DD|-] [end YYYY-MM-DD|-]
//! ```
//!
//! ## Environment Variables
//!
//! - HOTRANK_DB_PATH - SQLite database path (default: data/hotsearch.db)
//! - HOTRANK_BUSY_TIMEOUT_MS - Lock wait in milliseconds (default: 5000)
//! - HOTRANK_HISTORY_HOURS - Default query window (default: 24)
//! - HOTRANK_MIN_APPEARANCES - Default trending threshold (default: 3)
//! - HOTRANK_RISING_LIMIT - Default fastest-rising row count (default: 10)
//! - RUST_LOG - Logging level (optional, default: info)

use chrono::{NaiveDate, Utc};
use hotrank::{CrawlSnapshot, ExportFilter, HotStore, SnapshotWriter, StoreConfig};
use serde::Serialize;
use std::env;
use std::error::Error;
use std::sync::Arc;

const USAGE: &str = "usage: hotrank <ingest|stats|trending|rising|history|export> [args...]";

/// Optional positional argument; `-` counts as absent
fn optional_arg(args: &[String], index: usize) -> Option<&str> {
    args.get(index).map(String::as_str).filter(|s| *s != "-")
}

fn required_arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str, Box<dyn Error>> {
    optional_arg(args, index).ok_or_else(|| format!("missing argument <{}>\n{}", name, USAGE).into())
}

fn int_arg(args: &[String], index: usize, default: i64) -> Result<i64, Box<dyn Error>> {
    match optional_arg(args, index) {
        Some(s) => Ok(s.parse().map_err(|_| format!("not a number: {}", s))?),
        None => Ok(default),
    }
}

fn date_arg(args: &[String], index: usize) -> Result<Option<NaiveDate>, Box<dyn Error>> {
    match optional_arg(args, index) {
        Some(s) => Ok(Some(
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("not a date: {}", s))?,
        )),
        None => Ok(None),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = StoreConfig::from_env();
    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or_default();

    const COMMANDS: [&str; 6] = ["ingest", "stats", "trending", "rising", "history", "export"];
    if !COMMANDS.contains(&command) {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }

    log::debug!("Database: {}", config.db_path.display());

    let store = HotStore::open(&config)?;

    match command {
        "ingest" => {
            let path = required_arg(&args, 1, "snapshot.json")?;
            let snapshot = CrawlSnapshot::from_path(path)?;
            let writer: Arc<dyn SnapshotWriter> = Arc::new(store);

            let mut reports = Vec::new();
            for batch in snapshot.into_batches(Utc::now().timestamp()) {
                let report = writer
                    .write_batch(&batch.platform, batch.collected_at, batch.items)
                    .await?;
                reports.push(report);
            }

            let inserted: usize = reports.iter().map(|r| r.inserted).sum();
            log::info!("✅ Ingested {} new items across {} platforms", inserted, reports.len());
            print_json(&reports)?;
        }
        "stats" => {
            let reader = store.reader()?;
            print_json(&reader.statistics(optional_arg(&args, 1))?)?;
        }
        "trending" => {
            let platform = required_arg(&args, 1, "platform")?;
            let hours = int_arg(&args, 2, config.history_hours)?;
            let min_appearances = int_arg(&args, 3, config.min_appearances)?;
            let reader = store.reader()?;
            print_json(&reader.trending_topics(platform, hours, min_appearances)?)?;
        }
        "rising" => {
            let platform = required_arg(&args, 1, "platform")?;
            let limit = int_arg(&args, 2, config.rising_limit)?;
            let reader = store.reader()?;
            print_json(&reader.fastest_rising(platform, limit)?)?;
        }
        "history" => {
            let platform = required_arg(&args, 1, "platform")?;
            let item_id = required_arg(&args, 2, "item_id")?;
            let hours = int_arg(&args, 3, config.history_hours)?;
            let reader = store.reader()?;
            print_json(&reader.item_history(platform, item_id, hours)?)?;
        }
        "export" => {
            let out = required_arg(&args, 1, "out.csv")?;
            let filter = ExportFilter {
                platform: optional_arg(&args, 2).map(String::from),
                start_date: date_arg(&args, 3)?,
                end_date: date_arg(&args, 4)?,
            };
            let reader = store.reader()?;
            let written = reader.export_history_csv(out, &filter)?;
            println!("{} rows written to {}", written, out);
        }
        _ => unreachable!("command checked above"),
    }

    Ok(())
}
