//! Oscillator indicators
//!
//! This module provides the oscillators behind the technical traffic lights:
//! - RSI: Relative Strength Index (Wilder and EWM variants)
//! - MFI: Money Flow Index

use crate::common::{diff, gains_losses, nan_vec};
use crate::moving_averages::ewm_mean;

/// Relative Strength Index (Wilder's RSI)
///
/// Measures momentum by comparing magnitude of recent gains vs losses.
///
/// # Formula
/// RS = Average Gain / Average Loss (using Wilder's smoothing)
/// RSI = 100 - (100 / (1 + RS))
///
/// # Arguments
/// * `closes` - Closing prices
/// * `period` - Lookback period (typically 14)
///
/// # Returns
/// RSI values between 0 and 100
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    if n < period + 1 {
        return nan_vec(n);
    }

    let mut result = nan_vec(n);

    // Calculate price changes
    let changes = diff(closes);
    let (gains, losses) = gains_losses(&changes);

    // First average using SMA
    let mut avg_gain: f64 = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[..period].iter().sum::<f64>() / period as f64;

    result[period] = rsi_from_averages(avg_gain, avg_loss);

    // Subsequent RSI using Wilder's smoothing
    for i in period..changes.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        result[i + 1] = rsi_from_averages(avg_gain, avg_loss);
    }

    result
}

/// RSI with exponentially weighted averages (alpha = 1 / period)
///
/// This is the smoothing the traffic-light reports use; it tracks Wilder's
/// RSI closely but weights the full history rather than a seed window.
pub fn rsi_ewm(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    if n < period + 1 {
        return nan_vec(n);
    }

    let changes = diff(closes);
    let (gains, losses) = gains_losses(&changes);

    let alpha = 1.0 / period as f64;
    let avg_gains = ewm_mean(&gains, alpha, period);
    let avg_losses = ewm_mean(&losses, alpha, period);

    let mut result = nan_vec(n);
    for i in period..n {
        let ag = avg_gains[i - 1];
        let al = avg_losses[i - 1];
        if ag.is_nan() || al.is_nan() {
            continue;
        }
        result[i] = rsi_from_averages(ag, al);
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss != 0.0 {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    } else if avg_gain != 0.0 {
        100.0
    } else {
        50.0 // No movement
    }
}

/// Money Flow Index (MFI)
///
/// Volume-weighted RSI over rolling money-flow sums.
///
/// # Formula
/// Typical Price = (High + Low + Close) / 3
/// Raw Money Flow = Typical Price × Volume
/// MFI = 100 - (100 / (1 + Positive Flow Sum / Negative Flow Sum))
///
/// Days where the typical price falls or holds are counted as negative flow.
pub fn mfi(highs: &[f64], lows: &[f64], closes: &[f64], volumes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    if n < period + 1 || highs.len() != n || lows.len() != n || volumes.len() != n {
        return nan_vec(n);
    }

    // Typical price and raw money flow
    let tp: Vec<f64> = (0..n)
        .map(|i| (highs[i] + lows[i] + closes[i]) / 3.0)
        .collect();
    let rmf: Vec<f64> = (0..n).map(|i| tp[i] * volumes[i]).collect();

    let mut result = nan_vec(n);

    for i in period..n {
        let mut pos_flow = 0.0;
        let mut neg_flow = 0.0;

        for j in (i + 1 - period)..=i {
            if tp[j] > tp[j - 1] {
                pos_flow += rmf[j];
            } else {
                neg_flow += rmf[j];
            }
        }

        if neg_flow != 0.0 {
            result[i] = 100.0 - (100.0 / (1.0 + pos_flow / neg_flow));
        } else if pos_flow > 0.0 {
            result[i] = 100.0;
        } else {
            result[i] = 50.0;
        }
    }

    result
}
