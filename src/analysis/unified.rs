//! Unified analysis
//!
//! Fans out the six single-indicator analyses concurrently for one ticker
//! and folds their lights into four composite signals. A single failed
//! analysis degrades its section to `null` and its composite light to
//! `inactive` instead of failing the request.

use serde::Serialize;
use tracing::warn;

use crate::analysis::{
    bollinger::{self, BollingerReport},
    capm::{self, CapmReport},
    garch::{self, GarchReport},
    industry::{self, IndustryReport},
    mfi::{self, MfiReport},
    rsi::{self, RsiReport},
    timestamp, AnalysisContext,
};
use crate::error::Result;
use crate::signal::{majority, CompositeLight, TrafficLight};

#[derive(Debug, Clone, Serialize)]
pub struct CompositeLights {
    pub technical: CompositeLight,
    pub industry: CompositeLight,
    pub market: CompositeLight,
    pub risk: CompositeLight,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnifiedReport {
    pub symbol: String,
    pub timestamp: String,
    pub mfi: Option<MfiReport>,
    pub bollinger: Option<BollingerReport>,
    pub rsi: Option<RsiReport>,
    pub industry: Option<IndustryReport>,
    pub capm: Option<CapmReport>,
    pub garch: Option<GarchReport>,
    pub traffic_lights: CompositeLights,
}

pub async fn run(ctx: &AnalysisContext, symbol: &str) -> Result<UnifiedReport> {
    let (mfi, bollinger, rsi, industry, capm, garch) = tokio::join!(
        mfi::run(ctx, symbol),
        bollinger::run(ctx, symbol),
        rsi::run(ctx, symbol),
        industry::run(ctx, symbol),
        capm::run(ctx, symbol),
        garch::run(ctx, symbol),
    );

    let mfi = ok_or_warn("mfi", symbol, mfi);
    let bollinger = ok_or_warn("bollinger", symbol, bollinger);
    let rsi = ok_or_warn("rsi", symbol, rsi);
    let industry = ok_or_warn("industry", symbol, industry);
    let capm = ok_or_warn("capm", symbol, capm);
    let garch = ok_or_warn("garch", symbol, garch);

    let technical_signals: Vec<TrafficLight> = [
        mfi.as_ref().map(|r| r.traffic_light),
        bollinger.as_ref().map(|r| r.traffic_light),
        rsi.as_ref().map(|r| r.traffic_light),
    ]
    .into_iter()
    .flatten()
    .collect();

    let traffic_lights = CompositeLights {
        technical: majority(&technical_signals),
        industry: pass_through(industry.as_ref().map(|r| r.traffic_light)),
        market: pass_through(capm.as_ref().map(|r| r.traffic_light)),
        risk: pass_through(garch.as_ref().map(|r| r.traffic_light)),
    };

    Ok(UnifiedReport {
        symbol: symbol.to_string(),
        timestamp: timestamp(),
        mfi,
        bollinger,
        rsi,
        industry,
        capm,
        garch,
        traffic_lights,
    })
}

fn ok_or_warn<T>(analysis: &str, symbol: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(report) => Some(report),
        Err(err) => {
            warn!(%analysis, %symbol, %err, "analysis failed, section degraded");
            None
        }
    }
}

fn pass_through(light: Option<TrafficLight>) -> CompositeLight {
    light.map(CompositeLight::from).unwrap_or(CompositeLight::Inactive)
}
