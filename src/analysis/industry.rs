//! Industry-sensitivity analysis
//!
//! Regresses a stock's returns on the equal-weighted mean return of up to
//! ten same-industry peers. Peers whose data fails to load are skipped; the
//! regression runs on whatever portfolio remains.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::analysis::{
    dated_returns_pct, round2, round3, timestamp, AnalysisContext, MIN_COMMON_DAYS,
    REGRESSION_WINDOW,
};
use crate::data::{align_by_date, industry::IndustryMap};
use crate::error::{Error, Result};
use crate::regression::ols_hac;
use crate::signal::{self, TrafficLight};

/// Newey-West lag count used by the industry regression
const INDUSTRY_MAXLAGS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct IndustryReport {
    pub symbol: String,
    pub date: NaiveDate,
    pub industry: String,
    pub beta_industry: f64,
    pub r2_industry: f64,
    pub tstat_industry: f64,
    pub window_size: usize,
    pub peer_count: usize,
    pub traffic_light: TrafficLight,
    pub signal: String,
    pub summary: String,
    pub timestamp: String,
}

pub async fn run(ctx: &AnalysisContext, symbol: &str) -> Result<IndustryReport> {
    let map = IndustryMap::load(&ctx.industry_map_path)?;
    let industry = map.industry_of(symbol)?.to_string();
    let peers = map.peers_of(symbol)?;
    if peers.is_empty() {
        return Err(Error::NotFound(format!(
            "no other companies mapped to industry {}",
            industry
        )));
    }

    let snapshot = ctx.sources.fetch(symbol).await?;
    let ticker = snapshot.ticker.dropna();
    let stock_returns = dated_returns_pct(&ticker.dates, &ticker.close);

    // Equal-weighted mean return per date over however many peers loaded
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    let mut loaded = 0usize;
    for peer in &peers {
        match ctx.sources.fetch(peer).await {
            Ok(peer_snapshot) => {
                let series = peer_snapshot.ticker.dropna();
                loaded += 1;
                for (date, ret) in dated_returns_pct(&series.dates, &series.close) {
                    let entry = sums.entry(date).or_insert((0.0, 0));
                    entry.0 += ret;
                    entry.1 += 1;
                }
            }
            Err(err) => {
                warn!(%peer, %err, "skipping peer with no data");
            }
        }
    }
    if loaded == 0 {
        return Err(Error::NotFound(format!(
            "no peer data loaded for industry {}",
            industry
        )));
    }

    let portfolio_returns: Vec<(NaiveDate, f64)> = sums
        .into_iter()
        .map(|(date, (sum, count))| (date, sum / count as f64))
        .collect();

    let (dates, y, x) = align_by_date(&stock_returns, &portfolio_returns);
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

    let fit = ols_hac(ys, xs, INDUSTRY_MAXLAGS)?;
    let light = signal::industry_light(fit.beta, fit.r_squared);
    let (signal_text, summary) = describe(fit.beta, &industry, light);

    Ok(IndustryReport {
        symbol: symbol.to_string(),
        date: *dates.last().expect("window is non-empty"),
        industry,
        beta_industry: round3(fit.beta),
        r2_industry: round3(fit.r_squared),
        tstat_industry: round2(fit.t_stat),
        window_size: window,
        peer_count: loaded,
        traffic_light: light,
        signal: signal_text,
        summary,
        timestamp: timestamp(),
    })
}

fn describe(beta: f64, industry: &str, light: TrafficLight) -> (String, String) {
    match light {
        TrafficLight::Red => (
            "high sensitivity".into(),
            format!(
                "Industry beta of {:.2} reacts strongly to moves in the {} group.",
                beta, industry
            ),
        ),
        TrafficLight::Green => (
            "in step with peers".into(),
            format!(
                "Industry beta of {:.2} tracks the {} group at a healthy level.",
                beta, industry
            ),
        ),
        TrafficLight::Yellow => (
            "low sensitivity".into(),
            format!(
                "Industry beta of {:.2} shows a weak link to the {} group.",
                beta, industry
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_matches_light() {
        let (signal_text, summary) = describe(1.4, "Semiconductors", TrafficLight::Red);
        assert_eq!(signal_text, "high sensitivity");
        assert!(summary.contains("Semiconductors"));
    }
}
