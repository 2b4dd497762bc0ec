//! CSV data source.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use strata_core::{Bar, StrataError, StrataResult};

/// CSV record format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Date", alias = "date", alias = "timestamp", alias = "Timestamp")]
    date: String,
    #[serde(alias = "Open", alias = "open")]
    open: f64,
    #[serde(alias = "High", alias = "high")]
    high: f64,
    #[serde(alias = "Low", alias = "low")]
    low: f64,
    #[serde(alias = "Close", alias = "close", alias = "Adj Close")]
    close: f64,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: f64,
}

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];

/// Historical bars from one CSV file.
///
/// Headers are matched case-insensitively against common spellings; the
/// volume column is optional. Rows with a high below the low are skipped.
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    path: PathBuf,
}

impl CsvDataSource {
    pub fn new(path: impl AsRef<Path>) -> StrataResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StrataError::Data(format!(
                "no data file at {}",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every bar, sorted by timestamp.
    pub async fn load_all(&self) -> StrataResult<Vec<Bar>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || load_from_path(&path))
            .await
            .map_err(|e| StrataError::Data(format!("loader task failed: {e}")))?
    }

    /// Blocking variant of [`load_all`](Self::load_all).
    pub fn load_all_blocking(&self) -> StrataResult<Vec<Bar>> {
        load_from_path(&self.path)
    }
}

fn load_from_path(path: &Path) -> StrataResult<Vec<Bar>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| StrataError::Data(e.to_string()))?;

    let mut bars = Vec::new();
    for (row, result) in reader.deserialize().enumerate() {
        let record: CsvRecord =
            result.map_err(|e| StrataError::Data(format!("row {}: {e}", row + 1)))?;
        let timestamp = parse_timestamp(&record.date)?;
        if record.high < record.low {
            warn!(row = row + 1, high = record.high, low = record.low, "inverted bar skipped");
            continue;
        }
        bars.push(Bar::new(
            timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        ));
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

/// Parse a timestamp into Unix milliseconds (UTC).
///
/// Accepts RFC 3339, date-time and date-only formats, and Unix seconds or
/// milliseconds (more than ten digits).
pub fn parse_timestamp(text: &str) -> StrataResult<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.timestamp_millis());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }
    for format in DATE_FORMATS {
        let midnight = NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0));
        if let Some(dt) = midnight {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }
    if let Ok(ts) = text.parse::<i64>() {
        return Ok(if ts > 10_000_000_000 { ts } else { ts * 1000 });
    }
    Err(StrataError::Data(format!("could not parse date: {text}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        let day = 1_705_276_800_000; // 2024-01-15
        assert_eq!(parse_timestamp("2024-01-15").unwrap(), day);
        assert_eq!(
            parse_timestamp("2024-01-15 10:30:00").unwrap(),
            day + 630 * 60_000
        );
        assert_eq!(
            parse_timestamp("2024-01-15T10:30:00Z").unwrap(),
            day + 630 * 60_000
        );
        assert_eq!(parse_timestamp("1705312800000").unwrap(), 1_705_312_800_000);
        assert_eq!(parse_timestamp("1705312800").unwrap(), 1_705_312_800_000);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(CsvDataSource::new("/nonexistent/strata/bars.csv").is_err());
    }
}
