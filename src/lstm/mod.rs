//! Short-horizon direction predictor
//!
//! Trains a fresh LSTM classifier per request on technical-indicator
//! sequences and predicts the next session's direction for the traffic
//! light.
//!
//! Temporal layout around the reference date R (all offsets in business
//! days): training rows end at R - 10, evaluation covers the last five
//! sessions up to R, and the forecast targets R + 1. The label looks five
//! days ahead, so the ten-day training cutoff guarantees that no training
//! label window reaches the forecast target.

pub mod model;

use chrono::NaiveDate;
use ndarray::{Array1, Array3};
use serde::Serialize;
use tracing::{debug, warn};

use crate::analysis::{timestamp, AnalysisContext};
use crate::common::{add_business_days, log_returns, nan_vec, rolling, sample_std};
use crate::data::PriceSeries;
use crate::error::{Error, Result};
use crate::oscillators::rsi_ewm;
use crate::signal::{self, TrafficLight};
use crate::volatility::bollinger_bands;

pub use model::TrainConfig;

/// LSTM input sequence length in trading days
pub const WINDOW_DAYS: usize = 75;
/// Features per day
pub const NUM_FEATURES: usize = 7;
/// Business days before the reference date where training data ends
pub const TRAIN_CUTOFF_OFFSET: i64 = 10;
/// Sessions evaluated against known outcomes
pub const EVAL_HORIZON: usize = 5;
/// Days ahead the label looks
pub const LABEL_HORIZON: usize = 5;
/// Minimum cleaned training rows
pub const MIN_TRAIN_ROWS: usize = 100;
/// Validation share of the training sequences
const VALIDATION_SPLIT: f64 = 0.15;

const RSI_PERIOD: usize = 14;
const BB_PERIOD: usize = 20;
const BB_STD_MULT: f64 = 2.0;
const VOLATILITY_WINDOW: usize = 30;

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationSummary {
    pub dates: Vec<NaiveDate>,
    pub day_offsets: Vec<i64>,
    pub probabilities: Vec<f64>,
    pub predictions: Vec<u8>,
    pub actuals: Vec<Option<u8>>,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectionForecast {
    pub date: NaiveDate,
    pub day_offset: i64,
    pub probability_up: f64,
    pub predicted_direction: u8,
    pub color: TrafficLight,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LstmReport {
    pub symbol: String,
    pub reference_date: NaiveDate,
    pub evaluation: EvaluationSummary,
    pub traffic_light: Option<DirectionForecast>,
    pub timestamp: String,
}

/// One cleaned row of the feature table
struct FeatureRow {
    date: NaiveDate,
    features: [f64; NUM_FEATURES],
    /// Direction of the 5-day forward return, None when it runs past the data
    target: Option<bool>,
}

/// Indicator features per date, restricted to rows where every feature is
/// finite
fn build_feature_table(series: &PriceSeries) -> Vec<FeatureRow> {
    let closes = &series.close;
    let n = closes.len();

    let rsi = rsi_ewm(closes, RSI_PERIOD);
    let (upper, middle, lower) = bollinger_bands(closes, BB_PERIOD, BB_STD_MULT);
    let log_ret = log_returns(closes);

    let mut vol30 = nan_vec(n);
    let finite_start = log_ret.iter().position(|v| v.is_finite()).unwrap_or(n);
    if finite_start < n {
        let rolled = rolling(&log_ret[finite_start..], VOLATILITY_WINDOW, sample_std);
        for (offset, value) in rolled.into_iter().enumerate() {
            vol30[finite_start + offset] = value * (252.0_f64).sqrt();
        }
    }

    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let close = closes[i];
        if close <= 0.0 {
            continue;
        }
        let features = [
            rsi[i],
            (upper[i] - close) / close,
            (close - lower[i]) / close,
            (upper[i] - lower[i]) / middle[i],
            vol30[i],
            log_ret[i],
            series.volume[i],
        ];
        if features.iter().any(|v| !v.is_finite()) {
            continue;
        }
        let target = if i + LABEL_HORIZON < n {
            Some(closes[i + LABEL_HORIZON] > close)
        } else {
            None
        };
        rows.push(FeatureRow {
            date: series.dates[i],
            features,
            target,
        });
    }
    rows
}

/// Min-max scaler fitted on the training rows only
struct MinMaxScaler {
    min: [f64; NUM_FEATURES],
    range: [f64; NUM_FEATURES],
}

impl MinMaxScaler {
    fn fit(rows: &[&FeatureRow]) -> Self {
        let mut min = [f64::INFINITY; NUM_FEATURES];
        let mut max = [f64::NEG_INFINITY; NUM_FEATURES];
        for row in rows {
            for (j, v) in row.features.iter().enumerate() {
                min[j] = min[j].min(*v);
                max[j] = max[j].max(*v);
            }
        }
        let mut range = [1.0; NUM_FEATURES];
        for j in 0..NUM_FEATURES {
            let r = max[j] - min[j];
            range[j] = if r > 0.0 { r } else { 1.0 };
        }
        Self { min, range }
    }

    fn transform(&self, features: &[f64; NUM_FEATURES]) -> [f64; NUM_FEATURES] {
        let mut out = [0.0; NUM_FEATURES];
        for j in 0..NUM_FEATURES {
            out[j] = (features[j] - self.min[j]) / self.range[j];
        }
        out
    }
}

/// Sequence ending just before the row at `position`
fn sequence_at(scaled: &[[f64; NUM_FEATURES]], position: usize) -> Option<Array3<f64>> {
    if position < WINDOW_DAYS {
        return None;
    }
    let mut x = Array3::zeros((1, WINDOW_DAYS, NUM_FEATURES));
    for (t, row) in scaled[position - WINDOW_DAYS..position].iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            x[[0, t, j]] = *v;
        }
    }
    Some(x)
}

pub async fn run(
    ctx: &AnalysisContext,
    symbol: &str,
    reference_date: Option<NaiveDate>,
    config: &TrainConfig,
) -> Result<LstmReport> {
    let snapshot = ctx.sources.fetch(symbol).await?;
    let series = snapshot.ticker.dropna_ohlcv();
    if series.len() < MIN_TRAIN_ROWS {
        return Err(Error::InsufficientData(format!(
            "insufficient history for direction model: {} days with full OHLCV",
            series.len()
        )));
    }

    let table = build_feature_table(&series);
    if table.is_empty() {
        return Err(Error::InsufficientData(format!(
            "no usable feature rows for {}",
            symbol
        )));
    }

    let reference = reference_date
        .unwrap_or_else(|| table.last().expect("table is non-empty").date);
    let cutoff = add_business_days(reference, -TRAIN_CUTOFF_OFFSET);

    // Training rows: strictly before the cutoff and with a known label
    let train_rows: Vec<&FeatureRow> = table
        .iter()
        .filter(|row| row.date <= cutoff && row.target.is_some())
        .collect();
    let dropped = table.len() - train_rows.len();
    debug!(
        %symbol,
        %reference,
        %cutoff,
        kept = train_rows.len(),
        dropped,
        "applied temporal cutoff"
    );
    if train_rows.len() < MIN_TRAIN_ROWS {
        return Err(Error::InsufficientData(format!(
            "insufficient training data after cutoff: {} rows (minimum {})",
            train_rows.len(),
            MIN_TRAIN_ROWS
        )));
    }

    let scaler = MinMaxScaler::fit(&train_rows);
    let scaled_train: Vec<[f64; NUM_FEATURES]> =
        train_rows.iter().map(|row| scaler.transform(&row.features)).collect();

    // Sequences over the training rows; the label belongs to the row right
    // after each window
    let num_sequences = scaled_train.len().saturating_sub(WINDOW_DAYS);
    let mut x = Array3::zeros((num_sequences, WINDOW_DAYS, NUM_FEATURES));
    let mut y = Array1::zeros(num_sequences);
    for i in 0..num_sequences {
        for t in 0..WINDOW_DAYS {
            for j in 0..NUM_FEATURES {
                x[[i, t, j]] = scaled_train[i + t][j];
            }
        }
        y[i] = if train_rows[i + WINDOW_DAYS].target == Some(true) { 1.0 } else { 0.0 };
    }
    if num_sequences < 2 {
        return Err(Error::InsufficientData(format!(
            "only {} training sequences for {}",
            num_sequences, symbol
        )));
    }

    // Balanced class weights
    let positives = y.iter().filter(|v| **v > 0.5).count();
    let negatives = num_sequences - positives;
    if positives == 0 || negatives == 0 {
        return Err(Error::Model(
            "training labels are single-class; cannot fit a direction model".into(),
        ));
    }
    let class_weights = (
        num_sequences as f64 / (2.0 * negatives as f64),
        num_sequences as f64 / (2.0 * positives as f64),
    );

    // Chronological validation split from the tail
    let val_size = ((num_sequences as f64 * VALIDATION_SPLIT) as usize).max(1);
    let split = num_sequences - val_size;
    let train_x = x.slice(ndarray::s![..split, .., ..]).to_owned();
    let train_y = y.slice(ndarray::s![..split]).to_owned();
    let val_x = x.slice(ndarray::s![split.., .., ..]).to_owned();
    let val_y = y.slice(ndarray::s![split..]).to_owned();

    let (model, summary) = model::train(&train_x, &train_y, &val_x, &val_y, class_weights, config)?;
    debug!(
        %symbol,
        epochs = summary.epochs_run,
        best_val_loss = summary.best_val_loss,
        "direction model trained"
    );

    // Scale the whole table with the train-fitted scaler for inference
    let scaled_all: Vec<[f64; NUM_FEATURES]> =
        table.iter().map(|row| scaler.transform(&row.features)).collect();

    // Evaluate on the last sessions at or before the reference date
    let eval_positions: Vec<usize> = table
        .iter()
        .enumerate()
        .filter(|(_, row)| row.date <= reference)
        .map(|(i, _)| i)
        .collect();
    let eval_tail = &eval_positions[eval_positions.len().saturating_sub(EVAL_HORIZON)..];

    let mut evaluation = EvaluationSummary {
        dates: Vec::new(),
        day_offsets: Vec::new(),
        probabilities: Vec::new(),
        predictions: Vec::new(),
        actuals: Vec::new(),
        accuracy: 0.0,
    };
    let mut correct = 0usize;
    let mut graded = 0usize;
    for &position in eval_tail {
        let Some(seq) = sequence_at(&scaled_all, position) else {
            warn!(%symbol, date = %table[position].date, "not enough history for evaluation sequence");
            continue;
        };
        let prob = model.predict(&seq)[0];
        let predicted = u8::from(prob > 0.5);
        let actual = table[position].target.map(u8::from);
        if let Some(actual) = actual {
            graded += 1;
            if actual == predicted {
                correct += 1;
            }
        }
        evaluation.dates.push(table[position].date);
        evaluation
            .day_offsets
            .push((table[position].date - reference).num_days());
        evaluation.probabilities.push(prob);
        evaluation.predictions.push(predicted);
        evaluation.actuals.push(actual);
    }
    if graded > 0 {
        evaluation.accuracy = correct as f64 / graded as f64;
    }

    // Forecast for the next business day, anchored on the latest row at or
    // before the target
    let target_date = add_business_days(reference, 1);
    let forecast_position = table.iter().rposition(|row| row.date <= target_date);
    let traffic_light = forecast_position
        .and_then(|position| sequence_at(&scaled_all, position))
        .map(|seq| {
            let prob = model.predict(&seq)[0];
            let color = signal::lstm_light(prob);
            let color_name = format!("{:?}", color).to_uppercase();
            DirectionForecast {
                date: target_date,
                day_offset: 1,
                probability_up: prob,
                predicted_direction: u8::from(prob > 0.5),
                color,
                message: format!("accuracy {}/{} - {}", correct, graded, color_name),
            }
        });
    if traffic_light.is_none() {
        warn!(%symbol, "not enough history to anchor the forecast sequence");
    }

    Ok(LstmReport {
        symbol: symbol.to_string(),
        reference_date: reference,
        evaluation,
        traffic_light,
        timestamp: timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_series(days: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut date = start;
        let mut rows = Vec::with_capacity(days);
        for i in 0..days {
            while matches!(
                chrono::Datelike::weekday(&date),
                chrono::Weekday::Sat | chrono::Weekday::Sun
            ) {
                date = date.succ_opt().unwrap();
            }
            let close = 100.0 + (i as f64 * 0.21).sin() * 8.0 + i as f64 * 0.05;
            rows.push((date, [close, close + 1.0, close - 1.0, close, 1_000.0 + i as f64]));
            date = date.succ_opt().unwrap();
        }
        PriceSeries::from_rows(rows)
    }

    #[test]
    fn test_feature_table_has_seven_finite_features() {
        let series = synthetic_series(120);
        let table = build_feature_table(&series);
        assert!(!table.is_empty());
        for row in &table {
            assert!(row.features.iter().all(|v| v.is_finite()));
        }
        // Warm-up rows (30-day volatility window) are excluded
        assert!(table.len() < series.len());
        assert!(table.len() >= series.len() - 35);
    }

    #[test]
    fn test_labels_look_five_days_ahead() {
        let series = synthetic_series(120);
        let table = build_feature_table(&series);
        // The last five rows cannot know their outcome
        let unresolved = table.iter().rev().take_while(|r| r.target.is_none()).count();
        assert_eq!(unresolved, LABEL_HORIZON);
    }

    #[test]
    fn test_cutoff_excludes_label_overlap() {
        // Every training row's label window must close before the forecast
        // target: with a 10-business-day cutoff and 5-day labels, the last
        // training label is realized 5 business days before R, well clear
        // of R + 1.
        let series = synthetic_series(200);
        let table = build_feature_table(&series);
        let reference = table.last().unwrap().date;
        let cutoff = add_business_days(reference, -TRAIN_CUTOFF_OFFSET);

        let train_rows: Vec<&FeatureRow> = table
            .iter()
            .filter(|row| row.date <= cutoff && row.target.is_some())
            .collect();
        let forecast_target = add_business_days(reference, 1);
        for row in train_rows {
            let label_realized = add_business_days(row.date, LABEL_HORIZON as i64);
            assert!(label_realized < forecast_target);
        }
    }

    #[test]
    fn test_scaler_maps_train_rows_to_unit_interval() {
        let series = synthetic_series(150);
        let table = build_feature_table(&series);
        let refs: Vec<&FeatureRow> = table.iter().collect();
        let scaler = MinMaxScaler::fit(&refs);
        for row in &refs {
            let scaled = scaler.transform(&row.features);
            for v in scaled {
                assert!((-1e-9..=1.0 + 1e-9).contains(&v));
            }
        }
    }

    #[test]
    fn test_sequence_at_boundaries() {
        let scaled = vec![[0.5; NUM_FEATURES]; WINDOW_DAYS + 3];
        assert!(sequence_at(&scaled, WINDOW_DAYS - 1).is_none());
        let seq = sequence_at(&scaled, WINDOW_DAYS).unwrap();
        assert_eq!(seq.dim(), (1, WINDOW_DAYS, NUM_FEATURES));
    }
}
