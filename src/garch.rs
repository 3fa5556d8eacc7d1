//! GARCH(1,1) conditional-volatility model
//!
//! Fits the variance recursion
//!   sigma2[t] = omega + alpha * r[t-1]^2 + beta * sigma2[t-1]
//! to daily percent returns by maximizing the Gaussian log-likelihood over a
//! deterministic (alpha, beta) grid with variance-targeted omega, then
//! forecasts the one-step-ahead variance.
//!
//! A degenerate fit (persistence >= 1 or a non-finite likelihood) is an
//! error; callers fall back to a moment-based volatility estimate.

use crate::common::population_var;
use crate::error::{Error, Result};

/// Minimum number of return observations for a fit
pub const MIN_OBSERVATIONS: usize = 50;

/// Fitted GARCH(1,1) parameters and one-step forecast
#[derive(Debug, Clone)]
pub struct Garch11Fit {
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
    /// alpha + beta
    pub persistence: f64,
    /// One-step-ahead conditional volatility, same unit as the input returns
    pub sigma_forecast: f64,
    /// Long-run (unconditional) volatility implied by the parameters
    pub unconditional_sigma: f64,
    pub log_likelihood: f64,
}

/// Fit GARCH(1,1) to a series of daily percent returns
pub fn fit(returns: &[f64]) -> Result<Garch11Fit> {
    let clean: Vec<f64> = returns.iter().copied().filter(|r| r.is_finite()).collect();
    if clean.len() < MIN_OBSERVATIONS {
        return Err(Error::InsufficientData(format!(
            "GARCH fit needs at least {} returns, got {}",
            MIN_OBSERVATIONS,
            clean.len()
        )));
    }

    let sample_var = population_var(&clean);
    if !sample_var.is_finite() || sample_var <= 0.0 {
        return Err(Error::Model("return series has no variance".into()));
    }

    // Coarse grid, then a finer pass around the best point
    let mut best: Option<(f64, f64, f64)> = None; // (ll, alpha, beta)
    let coarse = search_grid(&clean, sample_var, alpha_steps(0.02, 0.20, 0.02), beta_steps(0.60, 0.97, 0.04));
    if let Some((ll, a, b)) = coarse {
        best = Some((ll, a, b));
        let fine = search_grid(
            &clean,
            sample_var,
            alpha_steps((a - 0.02).max(0.005), a + 0.02, 0.005),
            beta_steps((b - 0.04).max(0.30), (b + 0.04).min(0.985), 0.01),
        );
        if let Some(candidate) = fine {
            if candidate.0 > ll {
                best = Some(candidate);
            }
        }
    }

    let (log_likelihood, alpha, beta) = best.ok_or_else(|| {
        Error::Model("GARCH likelihood did not evaluate on any admissible parameters".into())
    })?;

    let persistence = alpha + beta;
    if persistence >= 1.0 {
        return Err(Error::Model(format!(
            "non-stationary fit: persistence {:.3} >= 1",
            persistence
        )));
    }

    let omega = sample_var * (1.0 - persistence);
    let sigma2 = conditional_variances(&clean, omega, alpha, beta, sample_var);

    let last_r = clean[clean.len() - 1];
    let last_var = sigma2[sigma2.len() - 1];
    let forecast_var = omega + alpha * last_r * last_r + beta * last_var;
    if !forecast_var.is_finite() || forecast_var <= 0.0 {
        return Err(Error::Model("non-finite variance forecast".into()));
    }

    Ok(Garch11Fit {
        omega,
        alpha,
        beta,
        persistence,
        sigma_forecast: forecast_var.sqrt(),
        unconditional_sigma: (omega / (1.0 - persistence)).sqrt(),
        log_likelihood,
    })
}

fn alpha_steps(from: f64, to: f64, step: f64) -> Vec<f64> {
    steps(from, to, step)
}

fn beta_steps(from: f64, to: f64, step: f64) -> Vec<f64> {
    steps(from, to, step)
}

fn steps(from: f64, to: f64, step: f64) -> Vec<f64> {
    let mut out = Vec::new();
    let mut v = from;
    while v <= to + 1e-12 {
        out.push(v);
        v += step;
    }
    out
}

fn search_grid(
    returns: &[f64],
    sample_var: f64,
    alphas: Vec<f64>,
    betas: Vec<f64>,
) -> Option<(f64, f64, f64)> {
    let mut best: Option<(f64, f64, f64)> = None;
    for &alpha in &alphas {
        for &beta in &betas {
            if alpha <= 0.0 || beta <= 0.0 || alpha + beta >= 0.999 {
                continue;
            }
            let omega = sample_var * (1.0 - alpha - beta);
            let ll = log_likelihood(returns, omega, alpha, beta, sample_var);
            if !ll.is_finite() {
                continue;
            }
            match best {
                Some((b, _, _)) if ll <= b => {}
                _ => best = Some((ll, alpha, beta)),
            }
        }
    }
    best
}

fn conditional_variances(
    returns: &[f64],
    omega: f64,
    alpha: f64,
    beta: f64,
    initial_var: f64,
) -> Vec<f64> {
    let n = returns.len();
    let mut sigma2 = vec![initial_var; n];
    for t in 1..n {
        sigma2[t] = omega + alpha * returns[t - 1] * returns[t - 1] + beta * sigma2[t - 1];
    }
    sigma2
}

fn log_likelihood(returns: &[f64], omega: f64, alpha: f64, beta: f64, initial_var: f64) -> f64 {
    let sigma2 = conditional_variances(returns, omega, alpha, beta, initial_var);
    let mut ll = 0.0;
    for (r, s2) in returns.iter().zip(&sigma2) {
        if *s2 <= 0.0 {
            return f64::NEG_INFINITY;
        }
        ll -= 0.5 * (s2.ln() + r * r / s2);
    }
    ll
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic heteroskedastic return series: calm and stormy regimes
    fn synthetic_returns(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let regime = if (i / 50) % 2 == 0 { 0.5 } else { 2.0 };
                let noise = (((i * 2654435761) % 1000) as f64 / 1000.0 - 0.5) * 2.0;
                regime * noise
            })
            .collect()
    }

    #[test]
    fn test_fit_produces_stationary_parameters() {
        let returns = synthetic_returns(300);
        let fit = fit(&returns).unwrap();
        assert!(fit.alpha > 0.0);
        assert!(fit.beta > 0.0);
        assert!(fit.persistence < 1.0);
        assert!(fit.sigma_forecast > 0.0);
        assert!(fit.sigma_forecast.is_finite());
        assert!(fit.unconditional_sigma > 0.0);
    }

    #[test]
    fn test_fit_rejects_short_series() {
        let returns = synthetic_returns(30);
        assert!(matches!(fit(&returns), Err(Error::InsufficientData(_))));
    }

    #[test]
    fn test_fit_rejects_constant_returns() {
        let returns = vec![0.0; 200];
        assert!(fit(&returns).is_err());
    }

    #[test]
    fn test_forecast_reacts_to_recent_shock() {
        // Identical series except for the final return; a large last shock
        // must raise the one-step forecast.
        let mut calm = synthetic_returns(250);
        let mut shocked = calm.clone();
        calm[249] = 0.1;
        shocked[249] = 8.0;
        let calm_fit = fit(&calm).unwrap();
        let shocked_fit = fit(&shocked).unwrap();
        assert!(shocked_fit.sigma_forecast > calm_fit.sigma_forecast);
    }
}
