//! CAPM market-beta analysis
//!
//! Six-month (126 trading day) OLS of stock returns on benchmark-index
//! returns with Newey-West standard errors, the lag count set by the
//! Andrews (1991) rule.

use chrono::NaiveDate;
use serde::Serialize;

use crate::analysis::{
    dated_returns_pct, round4, timestamp, AnalysisContext, MIN_COMMON_DAYS, REGRESSION_WINDOW,
};
use crate::data::align_by_date;
use crate::error::{Error, Result};
use crate::regression::{nw_maxlags, ols_hac};
use crate::signal::{self, TrafficLight};

#[derive(Debug, Clone, Serialize)]
pub struct CapmReport {
    pub symbol: String,
    pub date: NaiveDate,
    pub beta_market: f64,
    pub r2_market: f64,
    pub tstat_market: f64,
    pub window_size: usize,
    pub traffic_light: TrafficLight,
    pub signal: String,
    pub summary: String,
    pub timestamp: String,
}

pub async fn run(ctx: &AnalysisContext, symbol: &str) -> Result<CapmReport> {
    let snapshot = ctx.sources.fetch(symbol).await?;
    let ticker = snapshot.ticker.dropna();
    let index = snapshot.index.dropna();
    if index.is_empty() {
        return Err(Error::NotFound(format!(
            "no benchmark index data available for {}",
            symbol
        )));
    }

    let stock_returns = dated_returns_pct(&ticker.dates, &ticker.close);
    let index_returns = dated_returns_pct(&index.dates, &index.close);

    let (dates, y, x) = align_by_date(&stock_returns, &index_returns);
    if dates.len() < MIN_COMMON_DAYS {
        return Err(Error::InsufficientData(format!(
            "insufficient overlapping trading days: {} (need {})",
            dates.len(),
            MIN_COMMON_DAYS
        )));
    }

    let window = dates.len().min(REGRESSION_WINDOW);
    let ys = &y[y.len() - window..];
    let xs = &x[x.len() - window..];

    let fit = ols_hac(ys, xs, nw_maxlags(window))?;
    let light = signal::capm_light(fit.beta, fit.r_squared);
    let (signal_text, summary) = describe(fit.beta, light);

    Ok(CapmReport {
        symbol: symbol.to_string(),
        date: *dates.last().expect("window is non-empty"),
        beta_market: round4(fit.beta),
        r2_market: round4(fit.r_squared),
        tstat_market: round4(fit.t_stat),
        window_size: window,
        traffic_light: light,
        signal: signal_text,
        summary,
        timestamp: timestamp(),
    })
}

fn describe(beta: f64, light: TrafficLight) -> (String, String) {
    match light {
        TrafficLight::Red => (
            "high risk".into(),
            format!(
                "Beta of {:.2} amplifies market swings well beyond the index; this is a high-risk name.",
                beta
            ),
        ),
        TrafficLight::Green => (
            "market-aligned".into(),
            format!("Beta of {:.2} moves roughly in line with the market.", beta),
        ),
        TrafficLight::Yellow => (
            "moderate risk".into(),
            format!(
                "Beta of {:.2} points to a low-beta defensive profile or a weak market relationship.",
                beta
            ),
        ),
    }
}
