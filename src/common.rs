//! Common utilities shared across indicator modules

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Initialize a result vector with NaN values
#[inline]
pub fn nan_vec(len: usize) -> Vec<f64> {
    vec![f64::NAN; len]
}

/// Check if we have enough data for the given period
#[inline]
pub fn has_enough_data(len: usize, period: usize) -> bool {
    len >= period && period > 0
}

/// Calculate the sum of a slice
#[inline]
pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

/// Calculate the mean of a slice
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    sum(values) / values.len() as f64
}

/// Sample standard deviation (ddof = 1), matching the rolling std used by
/// the report builders
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var: f64 = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// Population variance (ddof = 0)
pub fn population_var(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Safe division that returns NaN on divide by zero
#[inline]
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        f64::NAN
    } else {
        numerator / denominator
    }
}

/// Compute rolling window operation
/// Returns vector of same length with NaN for insufficient lookback
pub fn rolling<F>(values: &[f64], period: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let n = values.len();
    if !has_enough_data(n, period) {
        return nan_vec(n);
    }

    let mut result = nan_vec(n);
    for i in (period - 1)..n {
        let window = &values[(i + 1 - period)..=i];
        result[i] = f(window);
    }
    result
}

/// Compute pairwise differences (like np.diff)
pub fn diff(values: &[f64]) -> Vec<f64> {
    if values.len() < 2 {
        return vec![];
    }
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Separate gains and losses from price changes
pub fn gains_losses(changes: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let gains: Vec<f64> = changes.iter().map(|&c| if c > 0.0 { c } else { 0.0 }).collect();
    let losses: Vec<f64> = changes.iter().map(|&c| if c < 0.0 { -c } else { 0.0 }).collect();
    (gains, losses)
}

/// Simple percent change over `period` steps
/// Returns vector of same length, NaN for the first `period` entries
pub fn pct_change(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = nan_vec(n);
    for i in period..n {
        result[i] = safe_div(values[i] - values[i - period], values[i - period]);
    }
    result
}

/// Natural-log returns, NaN for the first entry and non-positive prices
pub fn log_returns(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut result = nan_vec(n);
    for i in 1..n {
        if values[i] > 0.0 && values[i - 1] > 0.0 {
            result[i] = (values[i] / values[i - 1]).ln();
        }
    }
    result
}

/// Last non-NaN value in a series
pub fn last_valid(values: &[f64]) -> Option<f64> {
    values.iter().rev().find(|v| !v.is_nan()).copied()
}

/// Linear-interpolation percentile of a sample, q in [0, 100]
pub fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Step `n` business days forward (positive) or backward (negative),
/// skipping Saturdays and Sundays
pub fn add_business_days(date: NaiveDate, n: i64) -> NaiveDate {
    let step = if n >= 0 { 1 } else { -1 };
    let mut remaining = n.abs();
    let mut current = date;
    while remaining > 0 {
        current += Duration::days(step);
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            remaining -= 1;
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_vec() {
        let v = nan_vec(5);
        assert_eq!(v.len(), 5);
        assert!(v.iter().all(|x| x.is_nan()));
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[2.0, 4.0, 6.0]), 4.0);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_sample_std() {
        // ddof=1 std of [2,4,4,4,5,5,7,9] is ~2.138
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((sample_std(&values) - 2.1381).abs() < 1e-3);
        assert!(sample_std(&[1.0]).is_nan());
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(10.0, 2.0), 5.0);
        assert!(safe_div(10.0, 0.0).is_nan());
    }

    #[test]
    fn test_diff() {
        let v = vec![1.0, 3.0, 6.0, 10.0];
        assert_eq!(diff(&v), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_gains_losses() {
        let changes = vec![1.0, -2.0, 3.0, -1.0, 0.0];
        let (gains, losses) = gains_losses(&changes);
        assert_eq!(gains, vec![1.0, 0.0, 3.0, 0.0, 0.0]);
        assert_eq!(losses, vec![0.0, 2.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_rolling() {
        let v = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = rolling(&v, 3, mean);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_eq!(result[2], 2.0);
        assert_eq!(result[4], 4.0);
    }

    #[test]
    fn test_pct_change() {
        let v = vec![100.0, 110.0, 99.0];
        let r = pct_change(&v, 1);
        assert!(r[0].is_nan());
        assert!((r[1] - 0.1).abs() < 1e-12);
        assert!((r[2] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_log_returns() {
        let v = vec![100.0, 105.0];
        let r = log_returns(&v);
        assert!(r[0].is_nan());
        assert!((r[1] - (1.05f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_last_valid() {
        assert_eq!(last_valid(&[1.0, 2.0, f64::NAN]), Some(2.0));
        assert_eq!(last_valid(&[f64::NAN]), None);
    }

    #[test]
    fn test_percentile() {
        let v = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 100.0), 4.0);
        assert_eq!(percentile(&v, 50.0), 2.5);
    }

    #[test]
    fn test_add_business_days() {
        // Friday 2025-06-06 + 1 business day = Monday 2025-06-09
        let friday = NaiveDate::from_ymd_opt(2025, 6, 6).unwrap();
        assert_eq!(
            add_business_days(friday, 1),
            NaiveDate::from_ymd_opt(2025, 6, 9).unwrap()
        );
        // Monday - 1 business day = previous Friday
        let monday = NaiveDate::from_ymd_opt(2025, 6, 9).unwrap();
        assert_eq!(add_business_days(monday, -1), friday);
        // Thursday 2025-06-05 - 10 business days = 2025-05-22
        let thursday = NaiveDate::from_ymd_opt(2025, 6, 5).unwrap();
        assert_eq!(
            add_business_days(thursday, -10),
            NaiveDate::from_ymd_opt(2025, 5, 22).unwrap()
        );
    }
}
