//! Market data access
//!
//! One `PriceDataSource` trait with swappable back-ends:
//! - [`provider::HttpSource`]: live daily bars from the market-data API
//! - [`cache::DiskCache`]: 5-minute TTL JSON cache wrapping another source
//! - [`snapshot::CsvSnapshot`]: committed adjusted-close CSV, last resort
//!
//! Sources compose into a [`FallbackChain`]; the first one that succeeds
//! wins.

pub mod cache;
pub mod industry;
pub mod provider;
pub mod snapshot;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Daily OHLCV history for one ticker, columnar, ascending by date and
/// deduplicated by date
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceSeries {
    pub dates: Vec<NaiveDate>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

/// Close-only history, used for the benchmark index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseSeries {
    pub dates: Vec<NaiveDate>,
    pub close: Vec<f64>,
}

/// Everything one analysis request needs: the ticker history plus the
/// benchmark-index closes fetched alongside it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub ticker: PriceSeries,
    pub index: CloseSeries,
}

impl PriceSeries {
    /// Build from unordered rows; sorts ascending and keeps the last row
    /// per date
    pub fn from_rows(mut rows: Vec<(NaiveDate, [f64; 5])>) -> Self {
        rows.sort_by_key(|(date, _)| *date);
        let mut series = PriceSeries::default();
        for (date, [open, high, low, close, volume]) in rows {
            if series.dates.last() == Some(&date) {
                let i = series.len() - 1;
                series.open[i] = open;
                series.high[i] = high;
                series.low[i] = low;
                series.close[i] = close;
                series.volume[i] = volume;
            } else {
                series.dates.push(date);
                series.open.push(open);
                series.high.push(high);
                series.low.push(low);
                series.close.push(close);
                series.volume.push(volume);
            }
        }
        series
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Drop rows where any price field is non-finite
    ///
    /// Volume is not considered here; snapshot-backed series carry no
    /// volume. Analyses that need it use [`PriceSeries::dropna_ohlcv`].
    pub fn dropna(&self) -> PriceSeries {
        self.filter_rows(|s, i| {
            [s.open[i], s.high[i], s.low[i], s.close[i]]
                .iter()
                .all(|v| v.is_finite())
        })
    }

    /// Drop rows where any price field or the volume is non-finite
    pub fn dropna_ohlcv(&self) -> PriceSeries {
        self.filter_rows(|s, i| {
            [s.open[i], s.high[i], s.low[i], s.close[i], s.volume[i]]
                .iter()
                .all(|v| v.is_finite())
        })
    }

    fn filter_rows(&self, keep: impl Fn(&PriceSeries, usize) -> bool) -> PriceSeries {
        let mut out = PriceSeries::default();
        for i in 0..self.len() {
            if keep(self, i) {
                out.dates.push(self.dates[i]);
                out.open.push(self.open[i]);
                out.high.push(self.high[i]);
                out.low.push(self.low[i]);
                out.close.push(self.close[i]);
                out.volume.push(self.volume[i]);
            }
        }
        out
    }

    /// Rows within `[start, end]` inclusive
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        let mut out = PriceSeries::default();
        for i in 0..self.len() {
            if self.dates[i] >= start && self.dates[i] <= end {
                out.dates.push(self.dates[i]);
                out.open.push(self.open[i]);
                out.high.push(self.high[i]);
                out.low.push(self.low[i]);
                out.close.push(self.close[i]);
                out.volume.push(self.volume[i]);
            }
        }
        out
    }

    pub fn close_series(&self) -> CloseSeries {
        CloseSeries {
            dates: self.dates.clone(),
            close: self.close.clone(),
        }
    }
}

impl CloseSeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Drop rows with non-finite closes
    pub fn dropna(&self) -> CloseSeries {
        let mut out = CloseSeries::default();
        for i in 0..self.len() {
            if self.close[i].is_finite() {
                out.dates.push(self.dates[i]);
                out.close.push(self.close[i]);
            }
        }
        out
    }
}

/// Dated value pairs aligned on their common dates, both sides ordered
/// ascending
pub fn align_by_date(
    a: &[(NaiveDate, f64)],
    b: &[(NaiveDate, f64)],
) -> (Vec<NaiveDate>, Vec<f64>, Vec<f64>) {
    let mut dates = Vec::new();
    let mut left = Vec::new();
    let mut right = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dates.push(a[i].0);
                left.push(a[i].1);
                right.push(b[j].1);
                i += 1;
                j += 1;
            }
        }
    }
    (dates, left, right)
}

/// A source of market snapshots
#[async_trait]
pub trait PriceDataSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, symbol: &str) -> Result<MarketSnapshot>;
}

/// Ordered list of sources; the first success wins and failures accumulate
/// into the final error
pub struct FallbackChain {
    sources: Vec<Box<dyn PriceDataSource>>,
}

impl FallbackChain {
    pub fn new(sources: Vec<Box<dyn PriceDataSource>>) -> Self {
        Self { sources }
    }

    pub async fn fetch(&self, symbol: &str) -> Result<MarketSnapshot> {
        let mut failures = Vec::new();
        for source in &self.sources {
            match source.fetch(symbol).await {
                Ok(snapshot) if !snapshot.ticker.is_empty() => {
                    tracing::debug!(source = source.name(), %symbol, rows = snapshot.ticker.len(), "loaded market data");
                    return Ok(snapshot);
                }
                Ok(_) => {
                    tracing::warn!(source = source.name(), %symbol, "source returned no rows");
                    failures.push(format!("{}: empty", source.name()));
                }
                Err(err) => {
                    tracing::warn!(source = source.name(), %symbol, %err, "source failed");
                    failures.push(format!("{}: {}", source.name(), err));
                }
            }
        }
        Err(Error::NotFound(format!(
            "no data available for {} ({})",
            symbol,
            failures.join("; ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_from_rows_sorts_and_dedupes() {
        let rows = vec![
            (date(2025, 1, 3), [3.0, 3.0, 3.0, 3.0, 30.0]),
            (date(2025, 1, 1), [1.0, 1.0, 1.0, 1.0, 10.0]),
            (date(2025, 1, 1), [1.5, 1.5, 1.5, 1.5, 15.0]),
            (date(2025, 1, 2), [2.0, 2.0, 2.0, 2.0, 20.0]),
        ];
        let series = PriceSeries::from_rows(rows);
        assert_eq!(series.len(), 3);
        assert_eq!(series.dates, vec![date(2025, 1, 1), date(2025, 1, 2), date(2025, 1, 3)]);
        // Later duplicate wins
        assert_eq!(series.close[0], 1.5);
    }

    #[test]
    fn test_dropna_removes_gap_rows() {
        let rows = vec![
            (date(2025, 1, 1), [1.0, 1.0, 1.0, 1.0, 10.0]),
            (date(2025, 1, 2), [2.0, 2.0, f64::NAN, 2.0, 20.0]),
            (date(2025, 1, 3), [3.0, 3.0, 3.0, 3.0, 30.0]),
        ];
        let series = PriceSeries::from_rows(rows).dropna();
        assert_eq!(series.len(), 2);
        assert_eq!(series.dates, vec![date(2025, 1, 1), date(2025, 1, 3)]);
    }

    #[test]
    fn test_dropna_keeps_rows_without_volume() {
        let rows = vec![
            (date(2025, 1, 1), [1.0, 1.0, 1.0, 1.0, f64::NAN]),
            (date(2025, 1, 2), [2.0, 2.0, 2.0, 2.0, 20.0]),
        ];
        let series = PriceSeries::from_rows(rows);
        assert_eq!(series.dropna().len(), 2);
        assert_eq!(series.dropna_ohlcv().len(), 1);
    }

    #[test]
    fn test_between_inclusive() {
        let rows = (1..=10)
            .map(|d| (date(2025, 1, d), [d as f64; 5]))
            .collect();
        let series = PriceSeries::from_rows(rows);
        let window = series.between(date(2025, 1, 3), date(2025, 1, 5));
        assert_eq!(window.len(), 3);
        assert_eq!(window.dates[0], date(2025, 1, 3));
        assert_eq!(window.dates[2], date(2025, 1, 5));
    }

    #[test]
    fn test_align_by_date() {
        let a = vec![(date(2025, 1, 1), 1.0), (date(2025, 1, 2), 2.0), (date(2025, 1, 4), 4.0)];
        let b = vec![(date(2025, 1, 2), 20.0), (date(2025, 1, 3), 30.0), (date(2025, 1, 4), 40.0)];
        let (dates, left, right) = align_by_date(&a, &b);
        assert_eq!(dates, vec![date(2025, 1, 2), date(2025, 1, 4)]);
        assert_eq!(left, vec![2.0, 4.0]);
        assert_eq!(right, vec![20.0, 40.0]);
    }
}
