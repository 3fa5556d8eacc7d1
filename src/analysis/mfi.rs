//! 14-day Money Flow Index analysis

use chrono::NaiveDate;
use serde::Serialize;

use crate::analysis::{round2, timestamp, AnalysisContext, MFI_PERIOD};
use crate::common::last_valid;
use crate::error::{Error, Result};
use crate::oscillators::mfi;
use crate::signal::{self, TrafficLight};

#[derive(Debug, Clone, Serialize)]
pub struct MfiReport {
    pub symbol: String,
    pub date: NaiveDate,
    pub mfi_14: f64,
    pub traffic_light: TrafficLight,
    pub signal: String,
    pub summary: String,
    pub timestamp: String,
}

pub async fn run(ctx: &AnalysisContext, symbol: &str) -> Result<MfiReport> {
    let snapshot = ctx.sources.fetch(symbol).await?;
    // MFI needs real highs/lows/volume; close-only snapshot rows drop here
    let series = snapshot.ticker.dropna_ohlcv();
    if series.len() < MFI_PERIOD + 1 {
        return Err(Error::InsufficientData(format!(
            "insufficient data for MFI calculation: {} days with full OHLCV",
            series.len()
        )));
    }

    let values = mfi(&series.high, &series.low, &series.close, &series.volume, MFI_PERIOD);
    let latest = last_valid(&values).ok_or_else(|| {
        Error::InsufficientData(format!("MFI produced no value for {}", symbol))
    })?;
    let date = series
        .last_date()
        .ok_or_else(|| Error::InsufficientData(format!("no dated rows for {}", symbol)))?;

    let light = signal::mfi_light(latest);
    let (signal_text, summary) = describe(latest, light);

    Ok(MfiReport {
        symbol: symbol.to_string(),
        date,
        mfi_14: round2(latest),
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
                "MFI at {:.1} shows volume-backed overheating (80 or above); money inflow is excessive.",
                value
            ),
        ),
        TrafficLight::Green => (
            "buy signal".into(),
            format!(
                "MFI at {:.1} shows heavy outflow (20 or below); the stock is oversold.",
                value
            ),
        ),
        TrafficLight::Yellow => (
            "hold signal".into(),
            format!("MFI at {:.1} is in the neutral zone; holding is recommended.", value),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_matches_light() {
        let (signal_text, summary) = describe(85.0, TrafficLight::Red);
        assert_eq!(signal_text, "sell signal");
        assert!(summary.contains("85.0"));

        let (signal_text, _) = describe(50.0, TrafficLight::Yellow);
        assert_eq!(signal_text, "hold signal");
    }
}
