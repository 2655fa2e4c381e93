//! CSV export of the ranking history
//!
//! Rows are filtered by optional platform and an inclusive UTC date range and
//! ordered by (collected_at, platform, rank_position). The header row is the
//! table's column names.

use super::error::ExportError;
use super::reader::AnalyticsReader;
use chrono::{Days, NaiveDate};
use rusqlite::types::{ToSql, ValueRef};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Byte order mark written ahead of file exports
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Row filter for history exports
#[derive(Debug, Clone, Default)]
pub struct ExportFilter {
    pub platform: Option<String>,
    /// First included day (UTC)
    pub start_date: Option<NaiveDate>,
    /// Last included day (UTC)
    pub end_date: Option<NaiveDate>,
}

impl ExportFilter {
    fn validate(&self) -> Result<(), ExportError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ExportError::InvalidRange { start, end });
            }
        }
        Ok(())
    }
}

fn day_start(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(i64::MIN)
}

impl AnalyticsReader {
    /// Write matching history rows as CSV to `out`; returns the data row count
    pub fn write_history_csv<W: Write>(
        &self,
        out: W,
        filter: &ExportFilter,
    ) -> Result<usize, ExportError> {
        filter.validate()?;

        let mut sql = String::from(
            "SELECT id, platform, item_id, title, rank_position, hot, collected_at,
                    rank_change, hot_change, hot_growth_rate
             FROM ranking_history
             WHERE 1 = 1",
        );
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(platform) = &filter.platform {
            values.push(Box::new(platform.clone()));
            sql.push_str(&format!(" AND platform = ?{}", values.len()));
        }
        if let Some(start) = filter.start_date {
            values.push(Box::new(day_start(start)));
            sql.push_str(&format!(" AND collected_at >= ?{}", values.len()));
        }
        if let Some(end) = filter.end_date {
            // Exclusive upper bound: midnight after the last included day
            let bound = end
                .checked_add_days(Days::new(1))
                .map(day_start)
                .unwrap_or(i64::MAX);
            values.push(Box::new(bound));
            sql.push_str(&format!(" AND collected_at < ?{}", values.len()));
        }
        sql.push_str(" ORDER BY collected_at, platform, rank_position");

        let conn = self.connection();
        let mut stmt = conn.prepare(&sql)?;
        let header: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = header.len();

        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(&header)?;

        let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let mut rows = stmt.query(params.as_slice())?;
        let mut written = 0usize;

        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(column_count);
            for index in 0..column_count {
                record.push(cell_text(row.get_ref(index)?));
            }
            writer.write_record(&record)?;
            written += 1;
        }

        writer.flush()?;
        Ok(written)
    }

    /// Export matching history rows to a CSV file at `path`
    ///
    /// The file starts with a UTF-8 byte order mark so spreadsheet tools pick
    /// the right encoding for non-ASCII titles.
    pub fn export_history_csv(
        &self,
        path: impl AsRef<Path>,
        filter: &ExportFilter,
    ) -> Result<usize, ExportError> {
        let path = path.as_ref();
        filter.validate()?;

        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(UTF8_BOM)?;
        let written = self.write_history_csv(&mut file, filter)?;
        file.flush()?;

        log::info!("📤 Exported {} history rows to {}", written, path.display());
        Ok(written)
    }
}

fn cell_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::FetchedItem;
    use crate::store::writer::HotStore;
    use std::time::Duration;
    use tempfile::tempdir;

    fn item(id: &str, title: &str, hot: i64) -> FetchedItem {
        FetchedItem {
            id: id.to_string(),
            title: title.to_string(),
            popularity: Some(hot),
            ..Default::default()
        }
    }

    fn ts(date: &str, hour: u32) -> i64 {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp()
    }

    fn seeded_store(dir: &Path) -> HotStore {
        let store = HotStore::open_path(dir.join("hot.db"), Duration::from_secs(1)).unwrap();
        store
            .ingest_batch("weibo", ts("2024-03-01", 10), &[item("a", "first, quoted \"x\"", 10), item("b", "热搜", 5)])
            .unwrap();
        store
            .ingest_batch("zhihu", ts("2024-03-01", 10), &[item("z", "zhihu topic", 7)])
            .unwrap();
        store
            .ingest_batch("weibo", ts("2024-03-02", 23), &[item("b", "热搜", 9)])
            .unwrap();
        store
            .ingest_batch("weibo", ts("2024-03-03", 0), &[item("a", "first, quoted \"x\"", 1)])
            .unwrap();
        store
    }

    fn export_to_string(reader: &AnalyticsReader, filter: &ExportFilter) -> (usize, String) {
        let mut buf = Vec::new();
        let written = reader.write_history_csv(&mut buf, filter).unwrap();
        (written, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn test_export_all_rows_in_order() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path());
        let reader = store.reader().unwrap();

        let (written, text) = export_to_string(&reader, &ExportFilter::default());
        assert_eq!(written, 5);

        let mut csv_reader = csv::Reader::from_reader(text.as_bytes());
        let header: Vec<String> = csv_reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(
            header,
            vec![
                "id",
                "platform",
                "item_id",
                "title",
                "rank_position",
                "hot",
                "collected_at",
                "rank_change",
                "hot_change",
                "hot_growth_rate"
            ]
        );

        let rows: Vec<csv::StringRecord> = csv_reader.records().map(|r| r.unwrap()).collect();
        let order: Vec<(&str, &str)> = rows.iter().map(|r| (&r[1], &r[2])).collect();
        assert_eq!(
            order,
            vec![("weibo", "a"), ("weibo", "b"), ("zhihu", "z"), ("weibo", "b"), ("weibo", "a")]
        );

        // Quoting survives the round trip and first observations have empty change cells
        assert_eq!(&rows[0][3], "first, quoted \"x\"");
        assert_eq!(&rows[0][7], "");
        assert_eq!(&rows[3][8], "4");
    }

    #[test]
    fn test_export_filters_platform_and_dates() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path());
        let reader = store.reader().unwrap();

        let filter = ExportFilter {
            platform: Some("weibo".to_string()),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 2),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 2),
        };
        let (written, text) = export_to_string(&reader, &filter);

        assert_eq!(written, 1);
        assert!(text.contains("热搜"));
        assert!(!text.contains("zhihu"));
    }

    #[test]
    fn test_export_rejects_inverted_range() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path());
        let reader = store.reader().unwrap();

        let filter = ExportFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 5),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..Default::default()
        };
        let result = reader.write_history_csv(Vec::new(), &filter);
        assert!(matches!(result, Err(ExportError::InvalidRange { .. })));
    }

    #[test]
    fn test_export_file_has_bom() {
        let dir = tempdir().unwrap();
        let store = seeded_store(dir.path());
        let reader = store.reader().unwrap();
        let out = dir.path().join("history.csv");

        let written = reader
            .export_history_csv(&out, &ExportFilter::default())
            .unwrap();
        assert_eq!(written, 5);

        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        assert!(String::from_utf8_lossy(&bytes[3..]).starts_with("id,platform,item_id"));
    }
}
