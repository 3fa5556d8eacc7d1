//! Moving averages used by the oscillator and volatility modules

use crate::common::{has_enough_data, nan_vec};

/// Simple Moving Average (SMA)
///
/// The arithmetic mean of the last `period` values.
///
/// # Formula
/// SMA = (P1 + P2 + ... + Pn) / n
///
/// # Returns
/// Vector of same length as input, with NaN for first `period - 1` values
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    if !has_enough_data(n, period) {
        return nan_vec(n);
    }

    let mut result = nan_vec(n);

    // Calculate first SMA
    let mut sum: f64 = values[..period].iter().sum();
    result[period - 1] = sum / period as f64;

    // Rolling calculation - add new, subtract old
    for i in period..n {
        sum = sum + values[i] - values[i - period];
        result[i] = sum / period as f64;
    }

    result
}

/// Exponentially weighted mean with smoothing factor `alpha`
///
/// Uses the adjusted formulation: each output is the weighted average of all
/// observations so far with weights (1 - alpha)^k, so early values are not
/// biased toward the seed. The first `min_periods - 1` outputs are NaN.
pub fn ewm_mean(values: &[f64], alpha: f64, min_periods: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = nan_vec(n);
    if n == 0 || !(0.0..=1.0).contains(&alpha) {
        return result;
    }

    let decay = 1.0 - alpha;
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for i in 0..n {
        numerator = values[i] + decay * numerator;
        denominator = 1.0 + decay * denominator;
        if i + 1 >= min_periods {
            result[i] = numerator / denominator;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_basic() {
        let prices = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        let result = sma(&prices, 3);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_eq!(result[2], 4.0); // (2+4+6)/3
        assert_eq!(result[4], 8.0); // (6+8+10)/3
    }

    #[test]
    fn test_sma_insufficient() {
        let result = sma(&[1.0, 2.0], 3);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_ewm_mean_min_periods() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        let result = ewm_mean(&values, 0.5, 3);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert!(result[2].is_finite());
    }

    #[test]
    fn test_ewm_mean_adjusted_weights() {
        // With alpha = 0.5 and inputs [1, 2]:
        // (2*1 + 1*0.5) / (1 + 0.5) = 2.5 / 1.5
        let result = ewm_mean(&[1.0, 2.0], 0.5, 1);
        assert!((result[1] - 2.5 / 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_ewm_mean_constant_series() {
        let result = ewm_mean(&[5.0; 20], 1.0 / 14.0, 14);
        assert!((result[19] - 5.0).abs() < 1e-12);
    }
}
