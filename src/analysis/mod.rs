//! Report builders
//!
//! One module per analysis. Each loads history through the fallback chain,
//! applies the indicator math, classifies the result into a traffic light
//! and assembles a flat JSON-ready report.

pub mod bollinger;
pub mod capm;
pub mod garch;
pub mod industry;
pub mod mfi;
pub mod rsi;
pub mod unified;

use std::path::PathBuf;

use chrono::{NaiveDate, SecondsFormat, Utc};

use crate::data::{
    cache::DiskCache, provider::HttpSource, snapshot::CsvSnapshot, FallbackChain,
};

pub const RSI_PERIOD: usize = 14;
pub const MFI_PERIOD: usize = 14;
pub const BB_PERIOD: usize = 20;
pub const BB_STD_MULT: f64 = 2.0;
/// Six months of trading days for the regression analyses
pub const REGRESSION_WINDOW: usize = 126;
/// Floor below which a regression is refused outright
pub const MIN_COMMON_DAYS: usize = 60;
/// Rows of history required before a GARCH fit is attempted
pub const GARCH_MIN_ROWS: usize = 100;

/// Shared dependencies of the report builders
pub struct AnalysisContext {
    pub sources: FallbackChain,
    pub industry_map_path: PathBuf,
}

impl AnalysisContext {
    /// Production wiring: cached live fetch first, committed CSV snapshot
    /// as the last resort
    pub fn with_default_chain(data_dir: PathBuf, cache_dir: PathBuf) -> Self {
        let live = HttpSource::new();
        let cached = DiskCache::new(cache_dir, Box::new(live));
        let snapshot = CsvSnapshot::new(data_dir.join("snapshot_adj_close.csv"));
        Self {
            sources: FallbackChain::new(vec![Box::new(cached), Box::new(snapshot)]),
            industry_map_path: data_dir.join("industry_map.csv"),
        }
    }
}

/// RFC 3339 timestamp stamped on every report
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub fn round4(value: f64) -> f64 {
    (value * 10000.0).round() / 10000.0
}

/// Daily percent returns with their dates, non-finite entries skipped
pub fn dated_returns_pct(dates: &[NaiveDate], closes: &[f64]) -> Vec<(NaiveDate, f64)> {
    let mut out = Vec::with_capacity(closes.len().saturating_sub(1));
    for i in 1..closes.len() {
        if closes[i].is_finite() && closes[i - 1].is_finite() && closes[i - 1] != 0.0 {
            out.push((dates[i], (closes[i] / closes[i - 1] - 1.0) * 100.0));
        }
    }
    out
}
