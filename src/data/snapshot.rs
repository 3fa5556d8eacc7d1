//! Committed CSV snapshot source
//!
//! Last-resort back-end reading a wide adjusted-close CSV: a `Date` column
//! plus one column per ticker. Snapshots carry closes only, so the OHLC
//! fields mirror the close and volume is absent; analyses that need real
//! highs/lows/volume reject snapshot-backed series explicitly.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::data::{CloseSeries, MarketSnapshot, PriceDataSource, PriceSeries};
use crate::error::{Error, Result};

pub const DEFAULT_INDEX_COLUMN: &str = "^GSPC";

pub struct CsvSnapshot {
    path: PathBuf,
    index_column: String,
}

impl CsvSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            index_column: DEFAULT_INDEX_COLUMN.to_string(),
        }
    }

    pub fn index_column(mut self, column: impl Into<String>) -> Self {
        self.index_column = column.into();
        self
    }

    fn read_column(&self, symbol: &str) -> Result<Vec<(NaiveDate, f64)>> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|err| {
            Error::Io(format!("snapshot {} unreadable: {}", self.path.display(), err))
        })?;

        let headers = reader.headers()?.clone();
        let column = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "{} has no column for {}",
                    self.path.display(),
                    symbol
                ))
            })?;
        let date_column = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case("date"))
            .ok_or_else(|| Error::Parse(format!("{} has no Date column", self.path.display())))?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let date_field = record.get(date_column).unwrap_or_default().trim();
            let value_field = record.get(column).unwrap_or_default().trim();
            if date_field.is_empty() || value_field.is_empty() {
                continue;
            }
            let date = NaiveDate::parse_from_str(date_field, "%Y-%m-%d")
                .map_err(|err| Error::Parse(format!("bad date '{}': {}", date_field, err)))?;
            if let Ok(value) = value_field.parse::<f64>() {
                rows.push((date, value));
            }
        }
        rows.sort_by_key(|(date, _)| *date);
        Ok(rows)
    }
}

#[async_trait]
impl PriceDataSource for CsvSnapshot {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn fetch(&self, symbol: &str) -> Result<MarketSnapshot> {
        let closes = self.read_column(symbol)?;
        if closes.is_empty() {
            return Err(Error::NotFound(format!(
                "snapshot column for {} is empty",
                symbol
            )));
        }

        let rows = closes
            .iter()
            .map(|(date, close)| (*date, [*close, *close, *close, *close, f64::NAN]))
            .collect();

        let index = match self.read_column(&self.index_column) {
            Ok(pairs) => {
                let (dates, close) = pairs.into_iter().unzip();
                CloseSeries { dates, close }
            }
            Err(_) => CloseSeries::default(),
        };

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            ticker: PriceSeries::from_rows(rows),
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;

    fn write_snapshot(path: &Path) {
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "Date,AAPL,^GSPC").unwrap();
        writeln!(file, "2025-06-02,200.0,5900.0").unwrap();
        writeln!(file, "2025-06-03,202.0,5910.0").unwrap();
        writeln!(file, "2025-06-04,,5920.0").unwrap();
        writeln!(file, "2025-06-05,205.0,5930.0").unwrap();
    }

    fn temp_csv(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("speedtraffic-snap-{}-{}.csv", tag, std::process::id()))
    }

    #[tokio::test]
    async fn test_reads_ticker_and_index() {
        let path = temp_csv("basic");
        write_snapshot(&path);

        let snapshot = CsvSnapshot::new(&path).fetch("AAPL").await.unwrap();
        // Blank cell for 2025-06-04 is skipped
        assert_eq!(snapshot.ticker.len(), 3);
        assert_eq!(snapshot.ticker.close, vec![200.0, 202.0, 205.0]);
        assert_eq!(snapshot.index.len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_not_found() {
        let path = temp_csv("missing");
        write_snapshot(&path);

        let err = CsvSnapshot::new(&path).fetch("TSLA").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_snapshot_has_no_volume() {
        let path = temp_csv("volume");
        write_snapshot(&path);

        let snapshot = CsvSnapshot::new(&path).fetch("AAPL").await.unwrap();
        assert!(snapshot.ticker.volume.iter().all(|v| v.is_nan()));
    }
}
