//! 20-day, 2-sigma Bollinger Band analysis

use chrono::NaiveDate;
use serde::Serialize;

use crate::analysis::{round2, round4, timestamp, AnalysisContext, BB_PERIOD, BB_STD_MULT};
use crate::error::{Error, Result};
use crate::signal::{self, TrafficLight};
use crate::volatility::{bollinger_bands, percent_b};

#[derive(Debug, Clone, Serialize)]
pub struct BollingerReport {
    pub symbol: String,
    pub date: NaiveDate,
    pub close_price: f64,
    pub upper_band: f64,
    pub middle_band: f64,
    pub lower_band: f64,
    pub percent_b: f64,
    pub traffic_light: TrafficLight,
    pub signal: String,
    pub summary: String,
    pub timestamp: String,
}

pub async fn run(ctx: &AnalysisContext, symbol: &str) -> Result<BollingerReport> {
    let snapshot = ctx.sources.fetch(symbol).await?;
    let series = snapshot.ticker.dropna();
    if series.len() < BB_PERIOD {
        return Err(Error::InsufficientData(format!(
            "insufficient data for Bollinger calculation: {} days",
            series.len()
        )));
    }

    let (upper, middle, lower) = bollinger_bands(&series.close, BB_PERIOD, BB_STD_MULT);
    let pb = percent_b(&series.close, BB_PERIOD, BB_STD_MULT);

    let i = series.len() - 1;
    let latest = pb[i];
    if !latest.is_finite() {
        return Err(Error::Model(format!(
            "Bollinger bands collapsed for {}: no price variation in the window",
            symbol
        )));
    }

    let light = signal::percent_b_light(latest);
    let (signal_text, summary) = describe(latest, light);

    Ok(BollingerReport {
        symbol: symbol.to_string(),
        date: series.dates[i],
        close_price: round2(series.close[i]),
        upper_band: round2(upper[i]),
        middle_band: round2(middle[i]),
        lower_band: round2(lower[i]),
        percent_b: round4(latest),
        traffic_light: light,
        signal: signal_text,
        summary,
        timestamp: timestamp(),
    })
}

fn describe(value: f64, light: TrafficLight) -> (String, String) {
    match light {
        TrafficLight::Red => (
            "sell signal".into(),
            format!(
                "%B at {:.2} means price broke above the upper band; the stock looks overbought.",
                value
            ),
        ),
        TrafficLight::Green => (
            "buy signal".into(),
            format!(
                "%B at {:.2} means price fell below the lower band; the stock looks oversold.",
                value
            ),
        ),
        TrafficLight::Yellow => (
            "hold signal".into(),
            format!("%B at {:.2} keeps price inside the bands; holding is recommended.", value),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_matches_light() {
        let (signal_text, summary) = describe(1.08, TrafficLight::Red);
        assert_eq!(signal_text, "sell signal");
        assert!(summary.contains("upper band"));

        let (signal_text, _) = describe(-0.1, TrafficLight::Green);
        assert_eq!(signal_text, "buy signal");
    }
}
