//! GARCH(1,1) short-horizon risk analysis
//!
//! One-day conditional-volatility forecast mapped to a 95% value-at-risk
//! traffic light. When the fit degenerates the report falls back to the
//! sample-moment volatility and carries the failure reason in `error`.

use chrono::NaiveDate;
use serde::Serialize;

use crate::analysis::{round2, round4, timestamp, AnalysisContext, GARCH_MIN_ROWS};
use crate::common::{percentile, sample_std};
use crate::error::{Error, Result};
use crate::garch;
use crate::signal::{self, TrafficLight};

const VAR95_MULT: f64 = 1.65;
const VAR99_MULT: f64 = 2.33;
const RECENT_WINDOW: usize = 30;

#[derive(Debug, Clone, Serialize)]
pub struct GarchReport {
    pub symbol: String,
    pub date: NaiveDate,
    /// One-day volatility forecast, percent
    pub sigma_pct: f64,
    /// One-day 95% value-at-risk, percent
    pub var95_pct: f64,
    /// One-day 99% value-at-risk, percent
    pub var99_pct: f64,
    /// Annualized realized volatility of the last 30 sessions, percent
    pub recent_volatility_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omega: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence: Option<f64>,
    /// Annualized long-run volatility implied by the fit, percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unconditional_vol_pct: Option<f64>,
    /// Present when the GARCH fit failed and moments were used instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub traffic_light: TrafficLight,
    pub signal: String,
    pub summary: String,
    pub timestamp: String,
}

pub async fn run(ctx: &AnalysisContext, symbol: &str) -> Result<GarchReport> {
    let snapshot = ctx.sources.fetch(symbol).await?;
    let series = snapshot.ticker.dropna();
    if series.len() < GARCH_MIN_ROWS {
        return Err(Error::InsufficientData(format!(
            "insufficient data for GARCH calculation: {} days (need {})",
            series.len(),
            GARCH_MIN_ROWS
        )));
    }

    // Daily percent returns
    let mut returns = Vec::with_capacity(series.len() - 1);
    for i in 1..series.len() {
        if series.close[i - 1] != 0.0 {
            returns.push((series.close[i] / series.close[i - 1] - 1.0) * 100.0);
        }
    }

    let date = series
        .last_date()
        .ok_or_else(|| Error::InsufficientData(format!("no dated rows for {}", symbol)))?;

    let recent_tail = &returns[returns.len().saturating_sub(RECENT_WINDOW)..];
    let recent_volatility_pct = sample_std(recent_tail) * (252.0_f64).sqrt();

    let report = match garch::fit(&returns) {
        Ok(fit) => {
            let sigma_pct = fit.sigma_forecast;
            let var95_pct = VAR95_MULT * sigma_pct;
            let light = signal::garch_light(var95_pct);
            let (signal_text, summary) = describe(var95_pct, light, false);
            GarchReport {
                symbol: symbol.to_string(),
                date,
                sigma_pct: round2(sigma_pct),
                var95_pct: round2(var95_pct),
                var99_pct: round2(VAR99_MULT * sigma_pct),
                recent_volatility_pct: round2(recent_volatility_pct),
                omega: Some(round4(fit.omega)),
                alpha: Some(round4(fit.alpha)),
                beta: Some(round4(fit.beta)),
                persistence: Some(round4(fit.persistence)),
                unconditional_vol_pct: Some(round2(
                    fit.unconditional_sigma * (252.0_f64).sqrt(),
                )),
                error: None,
                traffic_light: light,
                signal: signal_text,
                summary,
                timestamp: timestamp(),
            }
        }
        Err(err) => {
            // Moment-based fallback: sample volatility and empirical VaR
            let sigma_pct = sample_std(&returns);
            let var95_pct = -percentile(&returns, 5.0);
            let var99_pct = -percentile(&returns, 1.0);
            let light = signal::garch_light(var95_pct);
            let (signal_text, summary) = describe(var95_pct, light, true);
            GarchReport {
                symbol: symbol.to_string(),
                date,
                sigma_pct: round2(sigma_pct),
                var95_pct: round2(var95_pct),
                var99_pct: round2(var99_pct),
                recent_volatility_pct: round2(recent_volatility_pct),
                omega: None,
                alpha: None,
                beta: None,
                persistence: None,
                unconditional_vol_pct: None,
                error: Some(format!("GARCH model fitting failed: {}", err)),
                traffic_light: light,
                signal: signal_text,
                summary,
                timestamp: timestamp(),
            }
        }
    };

    Ok(report)
}

fn describe(var95_pct: f64, light: TrafficLight, fallback: bool) -> (String, String) {
    let model = if fallback { "Realized volatility" } else { "The GARCH volatility forecast" };
    match light {
        TrafficLight::Red => (
            "high risk".into(),
            format!(
                "{} puts tomorrow's 95% confidence loss at {:.1}%, above the 3% short-term risk line.",
                model, var95_pct
            ),
        ),
        TrafficLight::Green => (
            "low risk".into(),
            format!(
                "{} puts tomorrow's 95% confidence loss at {:.1}%, under 2%; the short term looks stable.",
                model, var95_pct
            ),
        ),
        TrafficLight::Yellow => (
            "moderate risk".into(),
            format!(
                "{} puts tomorrow's 95% confidence loss at {:.1}%, a middling level of risk.",
                model, var95_pct
            ),
        ),
    }
}
