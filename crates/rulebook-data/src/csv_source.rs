//! CSV data source.
//!
//! Points either at a single OHLCV file, which then serves every symbol, or
//! at a directory holding one `<SYMBOL>.csv` per symbol.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use csv::ReaderBuilder;
use rulebook_core::error::DataError;
use rulebook_core::traits::DataSource;
use rulebook_core::types::{Bar, Timeframe};
use serde::Deserialize;
use tracing::{debug, warn};

/// CSV record format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(
        alias = "Date",
        alias = "date",
        alias = "Datetime",
        alias = "datetime",
        alias = "time",
        alias = "timestamp",
        alias = "Timestamp"
    )]
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
    #[serde(alias = "VWAP", alias = "vwap", default)]
    vwap: Option<f64>,
}

impl CsvRecord {
    fn into_bar(self) -> Result<Bar, DataError> {
        let timestamp = parse_timestamp(&self.date)?;
        let bar = Bar::new(
            timestamp, self.open, self.high, self.low, self.close, self.volume,
        );
        Ok(match self.vwap {
            Some(vwap) => bar.with_vwap(vwap),
            None => bar,
        })
    }
}

/// Parse the timestamp formats commonly found in exported bar files.
///
/// Dates without a time are taken as midnight UTC. Bare integers are unix
/// time, in milliseconds when larger than 10^10 and seconds otherwise.
pub fn parse_timestamp(date_str: &str) -> Result<i64, DataError> {
    let date_str = date_str.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.with_timezone(&Utc).timestamp_millis());
    }

    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(date_str, format) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }

    const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%m/%d/%Y", "%d-%m-%Y"];
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(date_str, format) {
            return Ok(d.and_time(NaiveTime::MIN).and_utc().timestamp_millis());
        }
    }

    if let Ok(ts) = date_str.parse::<i64>() {
        return Ok(if ts.abs() > 10_000_000_000 { ts } else { ts * 1000 });
    }

    Err(DataError::ParseError(format!(
        "Could not parse date: {}",
        date_str
    )))
}

/// CSV data source for historical data.
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    path: PathBuf,
}

impl CsvDataSource {
    /// Create a new CSV data source over a file or directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::NotFound(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Symbols available in directory mode, sorted. Empty for a single file.
    pub fn available_symbols(&self) -> Result<Vec<String>, DataError> {
        if !self.path.is_dir() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.path)?;
        let mut symbols: Vec<String> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        symbols.sort();
        Ok(symbols)
    }

    /// File holding `symbol`'s bars.
    fn file_for(&self, symbol: &str) -> Result<PathBuf, DataError> {
        if !self.path.is_dir() {
            return Ok(self.path.clone());
        }

        [symbol.to_string(), symbol.to_uppercase(), symbol.to_lowercase()]
            .into_iter()
            .map(|name| self.path.join(format!("{}.csv", name)))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| DataError::NotFound(format!("{} in {}", symbol, self.path.display())))
    }

    /// Load all bars for `symbol`, sorted by timestamp.
    pub async fn load_all(&self, symbol: &str) -> Result<Vec<Bar>, DataError> {
        let file = self.file_for(symbol)?;
        let content = tokio::fs::read(&file).await?;
        let bars = parse_csv(&content)?;
        debug!(symbol, file = %file.display(), bars = bars.len(), "Loaded CSV bars");
        Ok(bars)
    }
}

/// Parse CSV bytes into bars sorted by timestamp.
fn parse_csv(content: &[u8]) -> Result<Vec<Bar>, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let mut bars = reader
        .deserialize::<CsvRecord>()
        .map(|result| {
            result
                .map_err(|e| DataError::ParseError(e.to_string()))
                .and_then(CsvRecord::into_bar)
        })
        .collect::<Result<Vec<_>, _>>()?;

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

#[async_trait]
impl DataSource for CsvDataSource {
    async fn get_historical_bars(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, DataError> {
        let (start_ms, end_ms) = (start.timestamp_millis(), end.timestamp_millis());
        let bars: Vec<Bar> = self
            .load_all(symbol)
            .await?
            .into_iter()
            .filter(|b| (start_ms..=end_ms).contains(&b.timestamp))
            .collect();

        if bars.is_empty() {
            warn!(symbol, %start, %end, "No bars in requested range");
        }
        Ok(bars)
    }

    fn name(&self) -> &str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = "\
Date,Open,High,Low,Close,Volume
2024-01-03,102,104,101,103,1200
2024-01-01,100,101,99,100.5,1000
2024-01-02,100.5,103,100,102,1100
";

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rulebook-data-{}-{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("AAPL.csv");
        std::fs::write(&file, content).unwrap();
        file
    }

    #[test]
    fn test_parse_timestamp() {
        let day = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap().timestamp_millis();
        assert_eq!(parse_timestamp("2024-01-15").unwrap(), day);
        assert_eq!(parse_timestamp("2024/01/15").unwrap(), day);
        assert_eq!(parse_timestamp("01/15/2024").unwrap(), day);
        assert_eq!(parse_timestamp("20240115").unwrap(), day);

        let morning = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap().timestamp_millis();
        assert_eq!(parse_timestamp("2024-01-15 10:30:00").unwrap(), morning);
        assert_eq!(parse_timestamp("2024-01-15T10:30:00").unwrap(), morning);
        assert_eq!(parse_timestamp("2024-01-15T10:30:00Z").unwrap(), morning);
        assert_eq!(parse_timestamp("2024-01-15T12:30:00+02:00").unwrap(), morning);

        assert_eq!(parse_timestamp("1705312800000").unwrap(), 1_705_312_800_000);
        assert_eq!(parse_timestamp("1705312800").unwrap(), 1_705_312_800_000);

        assert!(matches!(parse_timestamp("yesterday"), Err(DataError::ParseError(_))));
    }

    #[test]
    fn test_parse_csv_sorts_and_aliases() {
        let bars = parse_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(bars.len(), 3);
        assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(bars[0].close, 100.5);

        let lower = "timestamp,open,high,low,close,volume,vwap\n1705312800,1,2,0.5,1.5,10,1.2\n";
        let bars = parse_csv(lower.as_bytes()).unwrap();
        assert_eq!(bars[0].timestamp, 1_705_312_800_000);
        assert_eq!(bars[0].vwap, Some(1.2));
    }

    #[test]
    fn test_parse_csv_rejects_bad_rows() {
        let bad = "Date,Open,High,Low,Close\n2024-01-01,1,2,0.5,abc\n";
        assert!(parse_csv(bad.as_bytes()).is_err());
    }

    #[test]
    fn test_missing_path() {
        assert!(matches!(
            CsvDataSource::new("/definitely/not/here.csv"),
            Err(DataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_range_filter() {
        let file = write_temp("range", SAMPLE);
        let source = CsvDataSource::new(&file).unwrap();

        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let bars = source
            .get_historical_bars("ANY", Timeframe::Daily, start, end)
            .await
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 102.0);
        assert_eq!(bars[1].close, 103.0);
    }

    #[tokio::test]
    async fn test_directory_mode() {
        let file = write_temp("dir", SAMPLE);
        let dir = file.parent().unwrap();
        let source = CsvDataSource::new(dir).unwrap();

        assert_eq!(source.available_symbols().unwrap(), vec!["AAPL".to_string()]);
        assert_eq!(source.load_all("aapl").await.unwrap().len(), 3);
        assert!(matches!(
            source.load_all("MSFT").await,
            Err(DataError::NotFound(_))
        ));

        let latest = source.get_latest_bar("AAPL", Timeframe::Daily).await.unwrap();
        assert_eq!(latest.map(|b| b.close), Some(103.0));
    }
}
