//! 14-day RSI analysis

use chrono::NaiveDate;
use serde::Serialize;

use crate::analysis::{round2, timestamp, AnalysisContext, RSI_PERIOD};
use crate::common::last_valid;
use crate::error::{Error, Result};
use crate::oscillators::rsi_ewm;
use crate::signal::{self, TrafficLight};

#[derive(Debug, Clone, Serialize)]
pub struct RsiReport {
    pub symbol: String,
    pub date: NaiveDate,
    pub rsi_14: f64,
    pub traffic_light: TrafficLight,
    pub signal: String,
    pub summary: String,
    pub timestamp: String,
}

pub async fn run(ctx: &AnalysisContext, symbol: &str) -> Result<RsiReport> {
    let snapshot = ctx.sources.fetch(symbol).await?;
    let series = snapshot.ticker.dropna();
    if series.len() < RSI_PERIOD + 1 {
        return Err(Error::InsufficientData(format!(
            "insufficient data for RSI calculation: {} days",
            series.len()
        )));
    }

    let values = rsi_ewm(&series.close, RSI_PERIOD);
    let latest = last_valid(&values).ok_or_else(|| {
        Error::InsufficientData(format!("RSI produced no value for {}", symbol))
    })?;
    let date = series
        .last_date()
        .ok_or_else(|| Error::InsufficientData(format!("no dated rows for {}", symbol)))?;

    let light = signal::rsi_light(latest);
    let (signal_text, summary) = describe(latest, light);

    Ok(RsiReport {
        symbol: symbol.to_string(),
        date,
        rsi_14: round2(latest),
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
                "RSI at {:.1} is in the overbought zone (70 or above); a pullback is likely.",
                value
            ),
        ),
        TrafficLight::Green => (
            "buy signal".into(),
            format!(
                "RSI at {:.1} is in the oversold zone (30 or below); a rebound is possible.",
                value
            ),
        ),
        TrafficLight::Yellow => (
            "hold signal".into(),
            format!("RSI at {:.1} is in the neutral zone; holding is recommended.", value),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_matches_light() {
        let (signal_text, summary) = describe(75.0, TrafficLight::Red);
        assert_eq!(signal_text, "sell signal");
        assert!(summary.contains("75.0"));
        assert!(summary.contains("overbought"));

        let (signal_text, _) = describe(25.0, TrafficLight::Green);
        assert_eq!(signal_text, "buy signal");
    }
}
