//! Volatility indicators
//!
//! Bollinger Bands, rolling standard deviation, realized volatility and
//! drawdown measures.

use crate::common::{has_enough_data, log_returns, nan_vec, rolling, sample_std};
use crate::moving_averages::sma;

/// Rolling sample standard deviation (ddof = 1)
pub fn std_dev(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    if !has_enough_data(n, period) {
        return nan_vec(n);
    }

    rolling(values, period, sample_std)
}

/// Bollinger Bands at `std_mult` standard deviations
///
/// Returns `(upper, middle, lower)` vectors, NaN for the warm-up rows.
pub fn bollinger_bands(
    closes: &[f64],
    period: usize,
    std_mult: f64,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = closes.len();
    let middle = sma(closes, period);
    let std = std_dev(closes, period);

    let mut upper = nan_vec(n);
    let mut lower = nan_vec(n);
    for i in 0..n {
        if !middle[i].is_nan() && !std[i].is_nan() {
            upper[i] = middle[i] + std_mult * std[i];
            lower[i] = middle[i] - std_mult * std[i];
        }
    }
    (upper, middle, lower)
}

/// Bollinger %B
///
/// Shows where price is relative to Bollinger Bands
///
/// # Formula
/// %B = (Close - Lower Band) / (Upper Band - Lower Band)
///
/// Returns values where:
/// - 0 = price at lower band
/// - 0.5 = price at middle band (SMA)
/// - 1 = price at upper band
/// - < 0 or > 1 = price outside bands
pub fn percent_b(closes: &[f64], period: usize, std_mult: f64) -> Vec<f64> {
    let n = closes.len();
    let (upper, _, lower) = bollinger_bands(closes, period, std_mult);

    let mut result = nan_vec(n);
    for i in 0..n {
        if !upper[i].is_nan() && !lower[i].is_nan() {
            let bandwidth = upper[i] - lower[i];
            if bandwidth != 0.0 {
                result[i] = (closes[i] - lower[i]) / bandwidth;
            }
        }
    }
    result
}

/// Annualized realized volatility of the last `period` log returns
///
/// # Formula
/// StdDev(ln(Close / Close[1])) * sqrt(252)
pub fn realized_volatility(closes: &[f64], period: usize) -> f64 {
    let returns = log_returns(closes);
    let valid: Vec<f64> = returns
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    if valid.len() < period {
        return f64::NAN;
    }
    let tail = &valid[valid.len() - period..];
    sample_std(tail) * (252.0_f64).sqrt()
}

/// Maximum drawdown over a value series, as a ratio in [0, 1]
///
/// - 0.0 = no drawdown ever
/// - 0.33 = maximum 33% decline from peak
pub fn max_drawdown_ratio(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut peak = values[0];
    let mut max_dd = 0.0;

    for &value in values {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        if a.is_nan() && b.is_nan() {
            return true;
        }
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_std_dev_basic() {
        // Sample std of these 8 values is ~2.138
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let result = std_dev(&values, 8);
        assert!(approx_eq(result[7], 2.1381, 0.001));
    }

    #[test]
    fn test_bollinger_bands_symmetric() {
        let closes: Vec<f64> = (1..=30).map(|x| 100.0 + (x as f64).sin() * 5.0).collect();
        let (upper, middle, lower) = bollinger_bands(&closes, 20, 2.0);

        for i in 19..closes.len() {
            assert!(upper[i] >= middle[i]);
            assert!(lower[i] <= middle[i]);
            assert!(approx_eq(upper[i] - middle[i], middle[i] - lower[i], 1e-9));
        }
    }

    #[test]
    fn test_percent_b_inside_bands() {
        let closes = vec![10.0, 11.0, 10.0, 11.0, 10.0, 11.0, 10.0];
        let result = percent_b(&closes, 3, 2.0);

        for v in result.iter() {
            if !v.is_nan() {
                assert!(*v > -1.0 && *v < 2.0);
            }
        }
    }

    #[test]
    fn test_percent_b_constant_price() {
        // Bands collapse when std dev is zero
        let closes = vec![10.0; 25];
        let result = percent_b(&closes, 20, 2.0);
        assert!(result[24].is_nan());
    }

    #[test]
    fn test_realized_volatility_positive() {
        let closes: Vec<f64> = (1..=100)
            .map(|x| 100.0 + (x as f64 * 0.1).sin() * 5.0)
            .collect();
        let vol = realized_volatility(&closes, 30);
        assert!(vol > 0.0);
    }

    #[test]
    fn test_realized_volatility_insufficient() {
        assert!(realized_volatility(&[100.0, 101.0], 30).is_nan());
    }

    #[test]
    fn test_max_drawdown_ratio() {
        let values = vec![100.0, 110.0, 120.0, 100.0, 80.0, 90.0];
        // Max drawdown is from 120 to 80 = 1/3
        assert!(approx_eq(max_drawdown_ratio(&values), 0.3333, 0.001));
    }

    #[test]
    fn test_max_drawdown_flat() {
        assert_eq!(max_drawdown_ratio(&[100.0; 10]), 0.0);
    }
}
