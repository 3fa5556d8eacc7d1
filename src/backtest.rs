//! Portfolio backtest
//!
//! Weighted buy-and-hold portfolio over a date range: every ticker is
//! indexed to 100 at the first common trading day, the portfolio value is
//! the weighted sum, and the usual performance metrics are computed on the
//! resulting curve.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analysis::AnalysisContext;
use crate::common::sample_std;
use crate::error::{Error, Result};

const RISK_FREE_RATE: f64 = 0.03;
const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, Deserialize)]
pub struct BacktestRequest {
    pub tickers: Vec<String>,
    pub weights: Vec<f64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub period: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyReturn {
    pub date: NaiveDate,
    #[serde(rename = "returnRate")]
    pub return_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResponse {
    pub period: String,
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    #[serde(rename = "dailyReturns")]
    pub daily_returns: Vec<DailyReturn>,
}

pub async fn run(ctx: &AnalysisContext, req: &BacktestRequest) -> Result<BacktestResponse> {
    if req.tickers.is_empty() {
        return Err(Error::InvalidInput("tickers must not be empty".into()));
    }
    if req.tickers.len() != req.weights.len() {
        return Err(Error::InvalidInput(format!(
            "{} tickers but {} weights",
            req.tickers.len(),
            req.weights.len()
        )));
    }
    if req.start_date >= req.end_date {
        return Err(Error::InvalidInput("start_date must precede end_date".into()));
    }
    if req.weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
        return Err(Error::InvalidInput("weights must be non-negative".into()));
    }

    // Tickers with no usable data drop out; their weight is redistributed
    let mut loaded: Vec<(String, Vec<(NaiveDate, f64)>)> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();
    for (ticker, weight) in req.tickers.iter().zip(&req.weights) {
        match ctx.sources.fetch(ticker).await {
            Ok(snapshot) => {
                let series = snapshot
                    .ticker
                    .between(req.start_date, req.end_date)
                    .dropna();
                if series.len() < 2 {
                    warn!(%ticker, rows = series.len(), "not enough rows in range, dropping from portfolio");
                    continue;
                }
                let closes = series
                    .dates
                    .iter()
                    .copied()
                    .zip(series.close.iter().copied())
                    .collect();
                loaded.push((ticker.clone(), closes));
                weights.push(*weight);
            }
            Err(err) => {
                warn!(%ticker, %err, "dropping ticker with no data");
            }
        }
    }

    evaluate(&loaded, &weights, &req.period)
}

/// Pure portfolio evaluation over already-loaded close series
pub fn evaluate(
    series: &[(String, Vec<(NaiveDate, f64)>)],
    weights: &[f64],
    period: &str,
) -> Result<BacktestResponse> {
    if series.is_empty() {
        return Err(Error::NotFound("no valid price data for any ticker".into()));
    }
    let weight_sum: f64 = weights.iter().sum();
    if weight_sum <= 0.0 {
        return Err(Error::InvalidInput("portfolio weights sum to zero".into()));
    }
    let weights: Vec<f64> = weights.iter().map(|w| w / weight_sum).collect();

    // Common trading days across every remaining ticker
    let mut common: Vec<NaiveDate> = series[0].1.iter().map(|(d, _)| *d).collect();
    for (_, closes) in &series[1..] {
        let dates: std::collections::HashSet<NaiveDate> =
            closes.iter().map(|(d, _)| *d).collect();
        common.retain(|d| dates.contains(d));
    }
    if common.len() < 2 {
        return Err(Error::InsufficientData(format!(
            "only {} common trading days across the portfolio",
            common.len()
        )));
    }

    // Index each ticker to 100 at the first common date, then combine
    let mut portfolio = vec![0.0; common.len()];
    for ((_, closes), weight) in series.iter().zip(&weights) {
        let by_date: std::collections::HashMap<NaiveDate, f64> =
            closes.iter().copied().collect();
        let base = by_date[&common[0]];
        if base <= 0.0 {
            return Err(Error::InvalidInput("non-positive base price".into()));
        }
        for (i, date) in common.iter().enumerate() {
            portfolio[i] += weight * by_date[date] / base * 100.0;
        }
    }

    let initial = portfolio[0];
    let total_return = portfolio[portfolio.len() - 1] / initial - 1.0;
    let annualized_return = annualize(total_return, period);

    let daily: Vec<f64> = portfolio.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
    let volatility = if daily.len() > 1 {
        sample_std(&daily) * TRADING_DAYS.sqrt()
    } else {
        0.0
    };
    let sharpe_ratio = if volatility > 0.0 {
        (annualized_return - RISK_FREE_RATE) / volatility
    } else {
        0.0
    };
    let max_drawdown = max_drawdown(&daily);

    let daily_returns = common
        .iter()
        .zip(&portfolio)
        .map(|(date, value)| DailyReturn {
            date: *date,
            return_rate: (value / initial - 1.0) * 100.0,
        })
        .collect();

    Ok(BacktestResponse {
        period: period.to_string(),
        total_return,
        annualized_return,
        volatility,
        sharpe_ratio,
        max_drawdown,
        daily_returns,
    })
}

fn annualize(total_return: f64, period: &str) -> f64 {
    if total_return <= -1.0 {
        return 0.0;
    }
    match period {
        "3M" => (1.0 + total_return).powf(365.0 / 90.0) - 1.0,
        "6M" => (1.0 + total_return).powf(365.0 / 180.0) - 1.0,
        _ => total_return,
    }
}

/// Most negative peak-to-trough move on the compounded return curve
fn max_drawdown(daily_returns: &[f64]) -> f64 {
    let mut cumulative = 1.0;
    let mut peak = 1.0;
    let mut worst = 0.0;
    for r in daily_returns {
        cumulative *= 1.0 + r;
        if cumulative > peak {
            peak = cumulative;
        }
        let dd = (cumulative - peak) / peak;
        if dd < worst {
            worst = dd;
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn flat_series(name: &str, days: u32) -> (String, Vec<(NaiveDate, f64)>) {
        (
            name.to_string(),
            (1..=days).map(|d| (date(d), 50.0)).collect(),
        )
    }

    #[test]
    fn test_flat_prices_are_all_zero() {
        let series = vec![flat_series("AAA", 20)];
        let result = evaluate(&series, &[1.0], "1Y").unwrap();
        assert_eq!(result.total_return, 0.0);
        assert_eq!(result.max_drawdown, 0.0);
        assert_eq!(result.sharpe_ratio, 0.0);
        assert_eq!(result.volatility, 0.0);
        assert!(result.daily_returns.iter().all(|r| r.return_rate == 0.0));
    }

    #[test]
    fn test_single_ticker_total_return() {
        let closes: Vec<(NaiveDate, f64)> = (1..=10)
            .map(|d| (date(d), 100.0 + d as f64))
            .collect();
        let result = evaluate(&[("AAA".into(), closes)], &[1.0], "1Y").unwrap();
        // 101 -> 110
        assert_relative_eq!(result.total_return, 110.0 / 101.0 - 1.0, epsilon = 1e-12);
        assert_eq!(result.daily_returns.len(), 10);
    }

    #[test]
    fn test_weights_are_renormalized() {
        let a: Vec<(NaiveDate, f64)> = (1..=5).map(|d| (date(d), 100.0)).collect();
        let b: Vec<(NaiveDate, f64)> = (1..=5).map(|d| (date(d), 100.0 + d as f64 * 10.0)).collect();
        // Unnormalized weights 3 and 1 act like 0.75 / 0.25
        let result = evaluate(&[("A".into(), a), ("B".into(), b)], &[3.0, 1.0], "1Y").unwrap();
        let expected = 0.25 * (150.0 / 110.0 - 1.0);
        assert_relative_eq!(result.total_return, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_intersection_of_dates() {
        let a: Vec<(NaiveDate, f64)> = (1..=10).map(|d| (date(d), 100.0)).collect();
        let b: Vec<(NaiveDate, f64)> = (5..=15).map(|d| (date(d), 100.0)).collect();
        let result = evaluate(&[("A".into(), a), ("B".into(), b)], &[0.5, 0.5], "1Y").unwrap();
        assert_eq!(result.daily_returns.len(), 6); // days 5..=10
    }

    #[test]
    fn test_drawdown_on_down_moves() {
        let closes: Vec<(NaiveDate, f64)> = [100.0, 110.0, 120.0, 100.0, 80.0, 90.0]
            .iter()
            .enumerate()
            .map(|(i, c)| (date(i as u32 + 1), *c))
            .collect();
        let result = evaluate(&[("AAA".into(), closes)], &[1.0], "1Y").unwrap();
        assert_relative_eq!(result.max_drawdown, -1.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_annualize_periods() {
        assert_relative_eq!(annualize(0.1, "1Y"), 0.1, epsilon = 1e-12);
        assert_relative_eq!(
            annualize(0.1, "3M"),
            (1.1f64).powf(365.0 / 90.0) - 1.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            annualize(0.1, "6M"),
            (1.1f64).powf(365.0 / 180.0) - 1.0,
            epsilon = 1e-12
        );
        assert_eq!(annualize(-1.5, "3M"), 0.0);
    }

    #[test]
    fn test_zero_weights_rejected() {
        let series = vec![flat_series("AAA", 5)];
        assert!(evaluate(&series, &[0.0], "1Y").is_err());
    }
}
