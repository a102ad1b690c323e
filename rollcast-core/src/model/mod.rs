//! Forecast model adapters.
//!
//! A model is fitted fresh on every training window and asked for exactly one
//! step ahead. Implementations:
//! - [`Arima`]: ARIMA(p, d, q) estimated by iterated Hannan–Rissanen regression
//! - [`Naive`]: last observed price
//! - [`Drift`]: last price plus the mean change across the window
//! - [`HistoricalMean`]: mean price of the window

pub mod arima;
pub mod baseline;

pub use arima::Arima;
pub use baseline::{Drift, HistoricalMean, Naive};

use crate::domain::WindowSlice;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for each of the AR and MA orders.
pub const MAX_ARMA_ORDER: usize = 10;
/// Upper bound for the differencing order.
pub const MAX_DIFFERENCING: usize = 2;

// ─── Errors ──────────────────────────────────────────────────────────

/// Why a single fit (or its forecast) could not be produced.
///
/// These are per-step failures: the engine records them as skipped steps and
/// carries on.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum ModelFitError {
    #[error("window too short: need {needed} observations, got {got}")]
    TooShort { needed: usize, got: usize },

    #[error("insufficient variation in training window")]
    InsufficientVariation,

    #[error("singular design matrix")]
    Singular,

    #[error("estimation did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("fit budget exceeded after {elapsed_ms}ms")]
    BudgetExceeded { elapsed_ms: u64 },

    #[error("non-finite coefficient or forecast")]
    NonFinite,
}

/// The model configuration itself is unusable. Fatal for a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelSpecError {
    #[error("{component} order {value} exceeds maximum {max}")]
    OrderTooLarge {
        component: &'static str,
        value: usize,
        max: usize,
    },

    #[error("ARIMA(0,0,0) has nothing to estimate")]
    EmptyOrder,

    #[error("window of {window} is too short for {model}: need at least {min}")]
    WindowTooShort {
        model: String,
        window: usize,
        min: usize,
    },
}

// ─── Budget ──────────────────────────────────────────────────────────

/// Limits applied to every individual fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitBudget {
    pub max_iterations: usize,
    pub timeout: Duration,
    /// Relative change in coefficients below which iteration stops.
    pub tolerance: f64,
}

impl Default for FitBudget {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            timeout: Duration::from_millis(2000),
            tolerance: 1e-6,
        }
    }
}

// ─── Traits ──────────────────────────────────────────────────────────

/// A model that can be estimated on a training window.
pub trait ForecastModel: Send + Sync + fmt::Debug {
    /// Display label, e.g. `ARIMA(2,1,2)`.
    fn name(&self) -> String;

    /// Estimate on the window. Must only read the points it is given.
    fn fit(&self, window: &WindowSlice<'_>) -> Result<Box<dyn FittedModel>, ModelFitError>;
}

/// An estimated model, ready to produce the next value.
pub trait FittedModel: Send + fmt::Debug {
    /// One-step-ahead forecast on the original price scale.
    fn predict_next(&self) -> f64;
}

// ─── Spec ────────────────────────────────────────────────────────────

/// Declarative model choice, as it appears in configuration files.
///
/// ```toml
/// [model]
/// kind = "arima"
/// p = 2
/// d = 1
/// q = 2
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Arima { p: usize, d: usize, q: usize },
    Naive,
    Drift,
    Mean,
}

impl Default for ModelSpec {
    fn default() -> Self {
        ModelSpec::Arima { p: 2, d: 1, q: 2 }
    }
}

impl ModelSpec {
    pub fn validate(&self) -> Result<(), ModelSpecError> {
        if let ModelSpec::Arima { p, d, q } = *self {
            for (component, value, max) in [
                ("AR", p, MAX_ARMA_ORDER),
                ("differencing", d, MAX_DIFFERENCING),
                ("MA", q, MAX_ARMA_ORDER),
            ] {
                if value > max {
                    return Err(ModelSpecError::OrderTooLarge {
                        component,
                        value,
                        max,
                    });
                }
            }
            if p + d + q == 0 {
                return Err(ModelSpecError::EmptyOrder);
            }
        }
        Ok(())
    }

    /// Check the spec and that `window` observations are enough to estimate it.
    pub fn validate_for_window(&self, window: usize) -> Result<(), ModelSpecError> {
        self.validate()?;
        let min = self.min_window();
        if window < min {
            return Err(ModelSpecError::WindowTooShort {
                model: self.label(),
                window,
                min,
            });
        }
        Ok(())
    }

    /// Smallest training window that leaves enough rows to estimate the model.
    pub fn min_window(&self) -> usize {
        match *self {
            ModelSpec::Arima { p, d, q } => arima::required_observations(p, d, q),
            ModelSpec::Naive | ModelSpec::Mean => 1,
            ModelSpec::Drift => 2,
        }
    }

    pub fn label(&self) -> String {
        match *self {
            ModelSpec::Arima { p, d, q } => format!("ARIMA({p},{d},{q})"),
            ModelSpec::Naive => "NAIVE".into(),
            ModelSpec::Drift => "DRIFT".into(),
            ModelSpec::Mean => "MEAN".into(),
        }
    }

    /// Instantiate the adapter for this spec.
    pub fn build(&self, budget: FitBudget) -> Result<Box<dyn ForecastModel>, ModelSpecError> {
        self.validate()?;
        Ok(match *self {
            ModelSpec::Arima { p, d, q } => Box::new(Arima::new(p, d, q, budget)),
            ModelSpec::Naive => Box::new(Naive),
            ModelSpec::Drift => Box::new(Drift),
            ModelSpec::Mean => Box::new(HistoricalMean),
        })
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl std::str::FromStr for ModelSpec {
    type Err = String;

    /// Accepts `naive`, `drift`, `mean`, `p,d,q` or `arima(p,d,q)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "naive" => return Ok(ModelSpec::Naive),
            "drift" => return Ok(ModelSpec::Drift),
            "mean" => return Ok(ModelSpec::Mean),
            _ => {}
        }
        let inner = lower
            .strip_prefix("arima")
            .unwrap_or(&lower)
            .trim_matches(|c| c == '(' || c == ')');
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(format!("cannot parse model '{s}': expected p,d,q or a baseline name"));
        }
        let parse = |v: &str| {
            v.parse::<usize>()
                .map_err(|e| format!("cannot parse model order '{v}': {e}"))
        };
        let spec = ModelSpec::Arima {
            p: parse(parts[0])?,
            d: parse(parts[1])?,
            q: parse(parts[2])?,
        };
        spec.validate().map_err(|e| e.to_string())?;
        Ok(spec)
    }
}
