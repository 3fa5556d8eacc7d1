//! Live market-data provider
//!
//! Pulls daily bars from a Yahoo-style chart API and normalizes them into a
//! [`MarketSnapshot`]. Rate-limit responses (HTTP 429) are retried with
//! exponential backoff; other network errors retry on a flat delay.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::data::{CloseSeries, MarketSnapshot, PriceDataSource, PriceSeries};
use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_INDEX_SYMBOL: &str = "^GSPC";
const DEFAULT_RANGE: &str = "3y";
const MAX_RETRIES: u32 = 3;
const BASE_DELAY_SECS: u64 = 2;

pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    index_symbol: String,
    range: String,
}

impl HttpSource {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(concat!("speedtraffic/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            index_symbol: DEFAULT_INDEX_SYMBOL.to_string(),
            range: DEFAULT_RANGE.to_string(),
        }
    }

    pub fn index_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.index_symbol = symbol.into();
        self
    }

    pub fn range(mut self, range: impl Into<String>) -> Self {
        self.range = range.into();
        self
    }

    async fn fetch_history(&self, symbol: &str) -> Result<PriceSeries> {
        let url = format!(
            "{}/v8/finance/chart/{}?range={}&interval=1d&events=div%2Csplit",
            self.base_url, symbol, self.range
        );

        let mut last_error = Error::Network(format!("no attempt made for {}", symbol));
        for attempt in 1..=MAX_RETRIES {
            match self.try_fetch(&url).await {
                Ok(series) => {
                    debug!(%symbol, rows = series.len(), attempt, "downloaded history");
                    return Ok(series);
                }
                Err(Error::RateLimit) => {
                    // Exponential backoff on 429
                    let wait = BASE_DELAY_SECS * 2u64.pow(attempt - 1);
                    warn!(%symbol, attempt, wait_secs = wait, "rate limited, backing off");
                    last_error = Error::RateLimit;
                    if attempt < MAX_RETRIES {
                        sleep(Duration::from_secs(wait)).await;
                    }
                }
                Err(Error::Network(msg)) => {
                    warn!(%symbol, attempt, %msg, "network error");
                    last_error = Error::Network(msg);
                    if attempt < MAX_RETRIES {
                        sleep(Duration::from_secs(BASE_DELAY_SECS)).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_error)
    }

    async fn try_fetch(&self, url: &str) -> Result<PriceSeries> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(Error::RateLimit);
        }
        if !status.is_success() {
            return Err(Error::Network(format!("HTTP {} from provider", status)));
        }

        let body: ChartResponse = response.json().await?;
        parse_chart(body)
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceDataSource for HttpSource {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn fetch(&self, symbol: &str) -> Result<MarketSnapshot> {
        let ticker = self.fetch_history(symbol).await?;
        if ticker.is_empty() {
            return Err(Error::NotFound(format!("no history returned for {}", symbol)));
        }

        // The benchmark index rides along for the regression analyses; its
        // absence is not fatal to the price-only indicators.
        let index = match self.fetch_history(&self.index_symbol).await {
            Ok(series) => series.close_series(),
            Err(err) => {
                warn!(index = %self.index_symbol, %err, "benchmark index fetch failed");
                CloseSeries::default()
            }
        };

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            ticker,
            index,
        })
    }
}

// Wire format of the chart endpoint, reduced to the fields we read

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    description: Option<String>,
}

#[derive(Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Deserialize)]
struct Quote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize)]
struct AdjClose {
    adjclose: Option<Vec<Option<f64>>>,
}

fn parse_chart(body: ChartResponse) -> Result<PriceSeries> {
    if let Some(err) = body.chart.error {
        return Err(Error::Network(format!(
            "provider error: {}",
            err.description.unwrap_or_else(|| "unknown".into())
        )));
    }

    let result = body
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .ok_or_else(|| Error::Parse("chart response had no result".into()))?;

    let timestamps = result
        .timestamp
        .ok_or_else(|| Error::Parse("chart response had no timestamps".into()))?;
    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| Error::Parse("chart response had no quote block".into()))?;

    let n = timestamps.len();
    let open = column(quote.open, n);
    let high = column(quote.high, n);
    let low = column(quote.low, n);
    let raw_close = column(quote.close, n);
    let volume = column(quote.volume, n);

    // Adjusted close replaces the raw close when the provider supplies it,
    // so returns are split- and dividend-consistent
    let close = result
        .indicators
        .adjclose
        .and_then(|mut a| if a.is_empty() { None } else { a.remove(0).adjclose })
        .map(|adj| column(Some(adj), n))
        .unwrap_or(raw_close);

    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let date = DateTime::from_timestamp(timestamps[i], 0)
            .ok_or_else(|| Error::Parse(format!("bad timestamp {}", timestamps[i])))?
            .date_naive();
        rows.push((date, [open[i], high[i], low[i], close[i], volume[i]]));
    }
    Ok(PriceSeries::from_rows(rows))
}

fn column(values: Option<Vec<Option<f64>>>, n: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; n];
    if let Some(values) = values {
        for (i, v) in values.into_iter().take(n).enumerate() {
            if let Some(v) = v {
                out[i] = v;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chart_with_adjclose() {
        let body: ChartResponse = serde_json::from_str(
            r#"{"chart":{"result":[{
                "timestamp":[1735689600,1735776000],
                "indicators":{
                    "quote":[{"open":[1.0,2.0],"high":[1.5,2.5],"low":[0.5,1.5],
                              "close":[1.2,2.2],"volume":[100.0,200.0]}],
                    "adjclose":[{"adjclose":[1.1,2.1]}]
                }}],"error":null}}"#,
        )
        .unwrap();
        let series = parse_chart(body).unwrap();
        assert_eq!(series.len(), 2);
        // Adjusted close wins over the raw close
        assert_eq!(series.close, vec![1.1, 2.1]);
        assert_eq!(series.volume, vec![100.0, 200.0]);
    }

    #[test]
    fn test_parse_chart_null_gaps_become_nan() {
        let body: ChartResponse = serde_json::from_str(
            r#"{"chart":{"result":[{
                "timestamp":[1735689600,1735776000],
                "indicators":{
                    "quote":[{"open":[1.0,null],"high":[1.5,null],"low":[0.5,null],
                              "close":[1.2,null],"volume":[100.0,null]}]
                }}],"error":null}}"#,
        )
        .unwrap();
        let series = parse_chart(body).unwrap();
        assert!(series.close[1].is_nan());
        assert_eq!(series.dropna().len(), 1);
    }

    #[test]
    fn test_parse_chart_provider_error() {
        let body: ChartResponse = serde_json::from_str(
            r#"{"chart":{"result":null,"error":{"description":"No data found"}}}"#,
        )
        .unwrap();
        assert!(parse_chart(body).is_err());
    }
}
