//! # SpeedTraffic
//!
//! Traffic-light stock analysis: technical and risk indicators computed
//! from daily OHLCV history, each mapped to a red/yellow/green signal, plus
//! an LSTM next-day direction predictor and a portfolio backtest.
//!
//! The crate splits into three layers:
//! - indicator math ([`oscillators`], [`volatility`], [`regression`],
//!   [`garch`], [`lstm`]) — pure functions over price slices
//! - data access ([`data`]) — live fetch, disk TTL cache and CSV snapshot
//!   back-ends behind one fallback chain
//! - delivery ([`analysis`], [`server`], [`backtest`]) — report builders,
//!   axum routes and the CLI entry points
//!
//! ## Example
//! ```
//! use speedtraffic::{oscillators, signal};
//!
//! let closes: Vec<f64> = (1..=30).map(|x| 40.0 + x as f64).collect();
//! let rsi = oscillators::rsi_ewm(&closes, 14);
//! let light = signal::rsi_light(*rsi.last().unwrap());
//! assert_eq!(light, signal::TrafficLight::Red);
//! ```

pub mod analysis;
pub mod backtest;
pub mod common;
pub mod data;
pub mod error;
pub mod garch;
pub mod lstm;
pub mod moving_averages;
pub mod oscillators;
pub mod regression;
pub mod server;
pub mod signal;
pub mod volatility;

pub use error::{Error, Result};
pub use signal::{CompositeLight, TrafficLight};
