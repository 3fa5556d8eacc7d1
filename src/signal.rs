//! Traffic-light classification
//!
//! Every analysis reduces to a ternary red/yellow/green signal via fixed
//! thresholds, and the unified analysis folds the technical signals into a
//! composite light by majority vote.

use serde::{Deserialize, Serialize};

/// Ternary signal emitted by every analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLight {
    Red,
    Yellow,
    Green,
}

/// Composite light for the unified analysis; `Inactive` marks a section
/// whose underlying analysis produced no signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeLight {
    Red,
    Yellow,
    Green,
    Inactive,
}

impl From<TrafficLight> for CompositeLight {
    fn from(light: TrafficLight) -> Self {
        match light {
            TrafficLight::Red => CompositeLight::Red,
            TrafficLight::Yellow => CompositeLight::Yellow,
            TrafficLight::Green => CompositeLight::Green,
        }
    }
}

/// RSI: >= 70 overbought, <= 30 oversold
pub fn rsi_light(value: f64) -> TrafficLight {
    if value >= 70.0 {
        TrafficLight::Red
    } else if value <= 30.0 {
        TrafficLight::Green
    } else {
        TrafficLight::Yellow
    }
}

/// MFI: >= 80 overbought on volume, <= 20 oversold
pub fn mfi_light(value: f64) -> TrafficLight {
    if value >= 80.0 {
        TrafficLight::Red
    } else if value <= 20.0 {
        TrafficLight::Green
    } else {
        TrafficLight::Yellow
    }
}

/// Bollinger %B: >= 1 breaks the upper band, <= 0 breaks the lower band
pub fn percent_b_light(value: f64) -> TrafficLight {
    if value >= 1.0 {
        TrafficLight::Red
    } else if value <= 0.0 {
        TrafficLight::Green
    } else {
        TrafficLight::Yellow
    }
}

/// CAPM beta against the market index
///
/// Red: amplifies market shocks (beta > 1.5 with meaningful fit).
/// Green: moves with the market (0.8 <= beta <= 1.3 with meaningful fit).
/// Yellow: low-beta defensive or weak relationship.
pub fn capm_light(beta: f64, r_squared: f64) -> TrafficLight {
    if beta > 1.5 && r_squared >= 0.3 {
        TrafficLight::Red
    } else if (0.8..=1.3).contains(&beta) && r_squared >= 0.3 {
        TrafficLight::Green
    } else {
        TrafficLight::Yellow
    }
}

/// Industry beta against the equal-weighted peer portfolio
pub fn industry_light(beta: f64, r_squared: f64) -> TrafficLight {
    if beta > 1.2 && r_squared >= 0.5 {
        TrafficLight::Red
    } else if (0.8..=1.2).contains(&beta) && r_squared >= 0.3 {
        TrafficLight::Green
    } else {
        TrafficLight::Yellow
    }
}

/// One-day 95% value-at-risk in percent
///
/// Red: > 3% possible loss tomorrow, Green: < 2%
pub fn garch_light(var95_pct: f64) -> TrafficLight {
    if var95_pct > 3.0 {
        TrafficLight::Red
    } else if var95_pct > 2.0 {
        TrafficLight::Yellow
    } else {
        TrafficLight::Green
    }
}

/// LSTM next-day direction probability; green means predicted up
pub fn lstm_light(probability_up: f64) -> TrafficLight {
    if probability_up > 0.525 {
        TrafficLight::Green
    } else if probability_up < 0.475 {
        TrafficLight::Red
    } else {
        TrafficLight::Yellow
    }
}

/// Majority vote over the technical signals (MFI, Bollinger, RSI)
///
/// Two or more red votes win red, two or more green votes win green,
/// anything else is yellow. No votes at all is inactive.
pub fn majority(signals: &[TrafficLight]) -> CompositeLight {
    if signals.is_empty() {
        return CompositeLight::Inactive;
    }
    let red = signals.iter().filter(|s| **s == TrafficLight::Red).count();
    let green = signals.iter().filter(|s| **s == TrafficLight::Green).count();
    if red >= 2 {
        CompositeLight::Red
    } else if green >= 2 {
        CompositeLight::Green
    } else {
        CompositeLight::Yellow
    }
}
