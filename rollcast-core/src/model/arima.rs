//! ARIMA(p, d, q) adapter.
//!
//! Estimation works on the d-times differenced window:
//! 1. pure AR (q = 0): ordinary least squares on an intercept and p lags
//! 2. q > 0: Hannan–Rissanen. A long autoregression supplies innovation
//!    estimates, then the ARMA coefficients are regressed on lagged values
//!    and lagged innovations. The regression is repeated with recursively
//!    recomputed residuals until the coefficients (or the residual sum of
//!    squares) stop moving, within the [`FitBudget`].
//!
//! The one-step forecast on the differenced scale is integrated back to the
//! price scale by adding the last value of every lower-order difference.

use super::{FitBudget, FittedModel, ForecastModel, ModelFitError};
use crate::domain::WindowSlice;
use nalgebra::{DMatrix, DVector};
use std::time::Instant;

const MIN_LONG_AR_ORDER: usize = 4;
const MAX_LONG_AR_ORDER: usize = 10;
/// Regression rows required beyond the number of estimated parameters.
const SPARE_ROWS: usize = 3;

/// Observations needed to estimate ARIMA(p, d, q) with the smallest
/// long-autoregression order.
pub fn required_observations(p: usize, d: usize, q: usize) -> usize {
    let differenced = if q == 0 {
        2 * p + 1 + SPARE_ROWS
    } else {
        let m = (p + q).max(MIN_LONG_AR_ORDER);
        (m + p + 2 * q + 1 + SPARE_ROWS).max(2 * m + 1 + SPARE_ROWS)
    };
    differenced + d
}

/// Long autoregression order used to approximate the innovations.
fn long_ar_order(p: usize, q: usize, n: usize) -> usize {
    (p + q)
        .max(MIN_LONG_AR_ORDER)
        .max((n / 10).min(MAX_LONG_AR_ORDER))
}

#[derive(Debug, Clone, Copy)]
pub struct Arima {
    p: usize,
    d: usize,
    q: usize,
    budget: FitBudget,
}

impl Arima {
    pub fn new(p: usize, d: usize, q: usize, budget: FitBudget) -> Self {
        Self { p, d, q, budget }
    }

    /// Estimate on a plain price slice.
    pub fn estimate(&self, prices: &[f64]) -> Result<FittedArima, ModelFitError> {
        let started = Instant::now();
        let needed = required_observations(self.p, self.d, self.q);
        if prices.len() < needed {
            return Err(ModelFitError::TooShort {
                needed,
                got: prices.len(),
            });
        }

        let (diffed, anchor) = difference(prices, self.d);
        check_variation(&diffed, prices)?;

        let coefficients = if self.q == 0 {
            fit_autoregression(&diffed, self.p)?
        } else {
            fit_arma(&diffed, self.p, self.q, &self.budget, started)?
        };

        let residuals = recursive_residuals(&diffed, &coefficients);
        if residuals.iter().any(|e| !e.is_finite()) {
            return Err(ModelFitError::NonFinite);
        }

        Ok(FittedArima {
            recent_values: diffed[diffed.len() - self.p..].to_vec(),
            recent_residuals: residuals[residuals.len() - self.q..].to_vec(),
            coefficients,
            anchor,
        })
    }
}

impl ForecastModel for Arima {
    fn name(&self) -> String {
        format!("ARIMA({},{},{})", self.p, self.d, self.q)
    }

    fn fit(&self, window: &WindowSlice<'_>) -> Result<Box<dyn FittedModel>, ModelFitError> {
        Ok(Box::new(self.estimate(&window.prices())?))
    }
}

// ─── Coefficients ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct Coefficients {
    intercept: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
}

impl Coefficients {
    fn from_vector(beta: &DVector<f64>, p: usize, q: usize) -> Self {
        Self {
            intercept: beta[0],
            ar: (0..p).map(|i| beta[1 + i]).collect(),
            ma: (0..q).map(|j| beta[1 + p + j]).collect(),
        }
    }

    fn to_vector(&self) -> DVector<f64> {
        let mut values = Vec::with_capacity(1 + self.ar.len() + self.ma.len());
        values.push(self.intercept);
        values.extend_from_slice(&self.ar);
        values.extend_from_slice(&self.ma);
        DVector::from_vec(values)
    }

    /// Conditional mean of `values[t]` given everything before `t`.
    fn conditional_mean(&self, values: &[f64], residuals: &[f64], t: usize) -> f64 {
        let ar: f64 = self
            .ar
            .iter()
            .enumerate()
            .map(|(i, phi)| phi * values[t - 1 - i])
            .sum();
        let ma: f64 = self
            .ma
            .iter()
            .enumerate()
            .filter(|(j, _)| t > *j)
            .map(|(j, theta)| theta * residuals[t - 1 - j])
            .sum();
        self.intercept + ar + ma
    }
}

/// Fitted ARIMA state: coefficients plus the tail needed for one step ahead.
#[derive(Debug, Clone)]
pub struct FittedArima {
    coefficients: Coefficients,
    /// Last p differenced values, oldest first.
    recent_values: Vec<f64>,
    /// Last q residuals, oldest first.
    recent_residuals: Vec<f64>,
    /// Sum of the last value of every lower-order difference.
    anchor: f64,
}

impl FittedArima {
    pub fn intercept(&self) -> f64 {
        self.coefficients.intercept
    }

    pub fn ar(&self) -> &[f64] {
        &self.coefficients.ar
    }

    pub fn ma(&self) -> &[f64] {
        &self.coefficients.ma
    }
}

impl FittedModel for FittedArima {
    fn predict_next(&self) -> f64 {
        let c = &self.coefficients;
        let ar: f64 = c
            .ar
            .iter()
            .zip(self.recent_values.iter().rev())
            .map(|(phi, v)| phi * v)
            .sum();
        let ma: f64 = c
            .ma
            .iter()
            .zip(self.recent_residuals.iter().rev())
            .map(|(theta, e)| theta * e)
            .sum();
        self.anchor + c.intercept + ar + ma
    }
}

// ─── Estimation ──────────────────────────────────────────────────────

/// Difference `d` times. Returns the differenced series and the integration
/// anchor for a one-step forecast.
fn difference(prices: &[f64], d: usize) -> (Vec<f64>, f64) {
    let mut series = prices.to_vec();
    let mut anchor = 0.0;
    for _ in 0..d {
        anchor += series.last().copied().unwrap_or(0.0);
        series = series.windows(2).map(|w| w[1] - w[0]).collect();
    }
    (series, anchor)
}

fn check_variation(values: &[f64], prices: &[f64]) -> Result<(), ModelFitError> {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let scale = prices.iter().fold(1.0_f64, |acc, p| acc.max(p.abs()));
    if !variance.is_finite() || variance.sqrt() <= 1e-10 * scale {
        return Err(ModelFitError::InsufficientVariation);
    }
    Ok(())
}

/// Regress `values[t]` on an intercept, `p` lagged values and `q` lagged
/// residuals for every `t` in `start..n`.
fn regress_lags(
    values: &[f64],
    residuals: &[f64],
    p: usize,
    q: usize,
    start: usize,
) -> Result<DVector<f64>, ModelFitError> {
    let n = values.len();
    let cols = 1 + p + q;
    let rows = n.saturating_sub(start);
    if rows < cols + SPARE_ROWS {
        return Err(ModelFitError::TooShort {
            needed: start + cols + SPARE_ROWS,
            got: n,
        });
    }

    let mut design = Vec::with_capacity(rows * cols);
    for t in start..n {
        design.push(1.0);
        design.extend((1..=p).map(|i| values[t - i]));
        design.extend((1..=q).map(|j| residuals[t - j]));
    }
    let x = DMatrix::from_row_slice(rows, cols, &design);
    let y = DVector::from_column_slice(&values[start..]);
    least_squares(&x, &y)
}

fn least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, ModelFitError> {
    let xt = x.transpose();
    let xtx = &xt * x;
    let xty = &xt * y;
    let cholesky = xtx.cholesky().ok_or(ModelFitError::Singular)?;
    let beta = cholesky.solve(&xty);
    if beta.iter().all(|b| b.is_finite()) {
        Ok(beta)
    } else {
        Err(ModelFitError::NonFinite)
    }
}

fn fit_autoregression(values: &[f64], p: usize) -> Result<Coefficients, ModelFitError> {
    let beta = regress_lags(values, &[], p, 0, p)?;
    Ok(Coefficients::from_vector(&beta, p, 0))
}

fn fit_arma(
    values: &[f64],
    p: usize,
    q: usize,
    budget: &FitBudget,
    started: Instant,
) -> Result<Coefficients, ModelFitError> {
    let n = values.len();

    // Stage 1: long autoregression for innovation estimates.
    let m = long_ar_order(p, q, n);
    let long = fit_autoregression(values, m)?;
    let mut innovations = vec![0.0; n];
    for t in m..n {
        innovations[t] = values[t] - long.conditional_mean(values, &[], t);
    }

    // Stage 2: regression on lagged values and estimated innovations.
    let beta = regress_lags(values, &innovations, p, q, m + q)?;
    let mut current = Coefficients::from_vector(&beta, p, q);
    let mut current_ssr = sum_of_squares(&recursive_residuals(values, &current));

    // Refinement with recursively computed residuals.
    let start = p.max(q);
    for _ in 0..budget.max_iterations {
        if started.elapsed() >= budget.timeout {
            return Err(ModelFitError::BudgetExceeded {
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        let residuals = recursive_residuals(values, &current);
        if residuals.iter().any(|e| !e.is_finite()) {
            return Err(ModelFitError::NonFinite);
        }
        let beta = regress_lags(values, &residuals, p, q, start)?;
        let next = Coefficients::from_vector(&beta, p, q);
        let next_ssr = sum_of_squares(&recursive_residuals(values, &next));
        if !next_ssr.is_finite() {
            return Err(ModelFitError::NonFinite);
        }

        let previous = current.to_vector();
        let delta = (&beta - &previous).amax();
        let scale = 1.0 + previous.amax();
        let ssr_change = (next_ssr - current_ssr).abs();

        current = next;
        current_ssr = next_ssr;
        if delta <= budget.tolerance * scale || ssr_change <= budget.tolerance * current_ssr {
            return Ok(current);
        }
    }

    if budget.max_iterations == 0 {
        return Ok(current);
    }
    Err(ModelFitError::NonConvergence {
        iterations: budget.max_iterations,
    })
}

/// Conditional residuals: zero for the first `p` points, then recursive.
fn recursive_residuals(values: &[f64], coefficients: &Coefficients) -> Vec<f64> {
    let p = coefficients.ar.len();
    let mut residuals = vec![0.0; values.len()];
    for t in p..values.len() {
        let expected = coefficients.conditional_mean(values, &residuals, t);
        residuals[t] = values[t] - expected;
    }
    residuals
}

fn sum_of_squares(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}
