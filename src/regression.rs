//! Single-regressor OLS with Newey-West (HAC) standard errors
//!
//! Backs the CAPM and industry-sensitivity analyses: slope of asset returns
//! on benchmark returns, with heteroskedasticity- and autocorrelation-
//! consistent errors for the t-statistic.

use crate::error::{Error, Result};

/// Result of an OLS fit of `y = intercept + beta * x`
#[derive(Debug, Clone, Copy)]
pub struct RegressionFit {
    pub beta: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// t-statistic of the slope under HAC standard errors
    pub t_stat: f64,
}

/// Newey-West lag count by the Andrews (1991) rule of thumb
///
/// # Formula
/// maxlags = floor(4 * (n / 100)^(2/9))
pub fn nw_maxlags(n: usize) -> usize {
    (4.0 * (n as f64 / 100.0).powf(2.0 / 9.0)).floor() as usize
}

/// OLS with intercept and Newey-West HAC slope standard error
///
/// Uses the Bartlett kernel with `maxlags` lags and the n/(n-k) small-sample
/// correction. Errors when the series lengths differ, the sample is smaller
/// than three observations, or the regressor is constant.
pub fn ols_hac(y: &[f64], x: &[f64], maxlags: usize) -> Result<RegressionFit> {
    let n = y.len();
    if n != x.len() {
        return Err(Error::InvalidInput(format!(
            "series length mismatch: {} vs {}",
            n,
            x.len()
        )));
    }
    if n < 3 {
        return Err(Error::InsufficientData(format!(
            "regression needs at least 3 observations, got {}",
            n
        )));
    }

    let nf = n as f64;
    let sx: f64 = x.iter().sum();
    let sy: f64 = y.iter().sum();
    let sxx: f64 = x.iter().map(|v| v * v).sum();
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();

    let det = nf * sxx - sx * sx;
    if det.abs() < f64::EPSILON * nf * sxx.max(1.0) {
        return Err(Error::Model("degenerate regressor: no variation in x".into()));
    }

    let beta = (nf * sxy - sx * sy) / det;
    let intercept = (sy - beta * sx) / nf;

    // Residuals and R^2
    let residuals: Vec<f64> = (0..n).map(|i| y[i] - intercept - beta * x[i]).collect();
    let ss_res: f64 = residuals.iter().map(|u| u * u).sum();
    let y_mean = sy / nf;
    let ss_tot: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    // HAC meat: S = Gamma_0 + sum_l w_l (Gamma_l + Gamma_l'),
    // g_t = [u_t, x_t * u_t], Bartlett weights w_l = 1 - l/(L+1)
    let g: Vec<[f64; 2]> = (0..n).map(|i| [residuals[i], x[i] * residuals[i]]).collect();

    let mut s = [[0.0f64; 2]; 2];
    for gt in &g {
        for a in 0..2 {
            for b in 0..2 {
                s[a][b] += gt[a] * gt[b];
            }
        }
    }
    let lags = maxlags.min(n.saturating_sub(1));
    for l in 1..=lags {
        let w = 1.0 - l as f64 / (lags as f64 + 1.0);
        for t in l..n {
            for a in 0..2 {
                for b in 0..2 {
                    let cross = g[t][a] * g[t - l][b];
                    s[a][b] += w * cross;
                    s[b][a] += w * cross;
                }
            }
        }
    }

    // V = (X'X)^{-1} S (X'X)^{-1}, with the n/(n-k) correction
    let inv = [[sxx / det, -sx / det], [-sx / det, nf / det]];
    let mut sm = [[0.0f64; 2]; 2];
    for a in 0..2 {
        for b in 0..2 {
            for k in 0..2 {
                sm[a][b] += s[a][k] * inv[k][b];
            }
        }
    }
    let mut v = [[0.0f64; 2]; 2];
    for a in 0..2 {
        for b in 0..2 {
            for k in 0..2 {
                v[a][b] += inv[a][k] * sm[k][b];
            }
        }
    }
    let correction = nf / (nf - 2.0);
    let se_beta = (v[1][1] * correction).max(0.0).sqrt();

    let t_stat = if se_beta > 0.0 {
        beta / se_beta
    } else if beta != 0.0 {
        f64::INFINITY * beta.signum()
    } else {
        0.0
    };

    Ok(RegressionFit {
        beta,
        intercept,
        r_squared,
        t_stat,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nw_maxlags_rule() {
        assert_eq!(nw_maxlags(100), 4);
        assert_eq!(nw_maxlags(126), 4);
        assert_eq!(nw_maxlags(50), 3);
        assert_eq!(nw_maxlags(1000), 6);
    }

    #[test]
    fn test_perfect_correlation() {
        // y identical to x: slope 1, full explanatory power
        let x: Vec<f64> = (0..126).map(|i| ((i * 37) % 17) as f64 - 8.0).collect();
        let fit = ols_hac(&x, &x, 4).unwrap();
        assert_relative_eq!(fit.beta, 1.0, epsilon = 1e-9);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-9);
        assert_relative_eq!(fit.intercept, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_known_slope_and_intercept() {
        let x: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 + 2.0 * v).collect();
        let fit = ols_hac(&y, &x, 5).unwrap();
        assert_relative_eq!(fit.beta, 2.0, epsilon = 1e-9);
        assert_relative_eq!(fit.intercept, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_noisy_slope() {
        // Deterministic pseudo-noise around y = 1.2x
        let x: Vec<f64> = (0..200).map(|i| ((i * 73) % 41) as f64 / 10.0 - 2.0).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 1.2 * v + ((i * 31) % 7) as f64 / 50.0 - 0.06)
            .collect();
        let fit = ols_hac(&y, &x, nw_maxlags(200)).unwrap();
        assert!((fit.beta - 1.2).abs() < 0.05);
        assert!(fit.r_squared > 0.9);
        assert!(fit.t_stat > 10.0);
    }

    #[test]
    fn test_constant_regressor_rejected() {
        let x = vec![1.0; 50];
        let y: Vec<f64> = (0..50).map(|i| i as f64).collect();
        assert!(ols_hac(&y, &x, 4).is_err());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(ols_hac(&[1.0, 2.0], &[1.0], 1).is_err());
    }
}
