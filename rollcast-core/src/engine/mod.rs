//! Rolling walk-forward engine.
//!
//! For every target index `i` in `[first_step, len)`:
//! 1. fit a fresh model on exactly the `W` observations at `[i - W, i)`
//! 2. forecast one step ahead
//! 3. derive the signal against the last price inside the window
//! 4. record `(date_i, actual_i, forecast, reference, signal)`
//!
//! A failed fit or a non-finite forecast skips the step and is logged; the run
//! continues. Steps are independent, so they can be evaluated on the rayon
//! pool; the ledger is always assembled in index order.

pub mod outcome;

pub use outcome::{BacktestRun, RunMetadata, SkippedStep, StepOutcome};

use crate::domain::{ForecastLedger, ForecastRecord, Signal, TimeSeries};
use crate::model::{FitBudget, ForecastModel, ModelFitError, ModelSpec, ModelSpecError};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Smallest usable training window.
pub const MIN_WINDOW: usize = 2;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Limits applied to each individual fit.
    pub fit_budget: FitBudget,
    /// Evaluate steps on the rayon pool instead of sequentially.
    pub parallel: bool,
    /// First forecast target. Defaults to the window size; values below the
    /// window size are raised to it.
    pub first_step: Option<usize>,
    /// Log progress every this many steps (0 disables).
    pub progress_every: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fit_budget: FitBudget::default(),
            parallel: false,
            first_step: None,
            progress_every: 50,
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Run-level failures. Per-step fit failures never surface here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid window size {window}: must be at least 2")]
    InvalidWindow { window: usize },

    #[error("invalid model specification: {0}")]
    InvalidModelSpec(#[from] ModelSpecError),

    #[error("insufficient data for '{symbol}': need at least {required} points, have {available}")]
    InsufficientData {
        symbol: String,
        required: usize,
        available: usize,
    },

    #[error("first step {first_step} leaves nothing to forecast in {len} points")]
    InvalidFirstStep { first_step: usize, len: usize },

    #[error("run cancelled after {completed} of {total} steps")]
    Cancelled { completed: usize, total: usize },
}

// ─── Entry points ────────────────────────────────────────────────────

/// Run the rolling backtest for a declarative model spec.
pub fn run_rolling(
    series: &TimeSeries,
    window: usize,
    spec: &ModelSpec,
    config: &EngineConfig,
    cancel: Option<&AtomicBool>,
) -> Result<BacktestRun, EngineError> {
    check_window(window)?;
    spec.validate_for_window(window)?;
    let model = spec.build(config.fit_budget)?;
    run_with_model(series, window, model.as_ref(), config, cancel)
}

/// Run the rolling backtest with an already constructed model.
pub fn run_with_model(
    series: &TimeSeries,
    window: usize,
    model: &dyn ForecastModel,
    config: &EngineConfig,
    cancel: Option<&AtomicBool>,
) -> Result<BacktestRun, EngineError> {
    check_window(window)?;
    if series.len() <= window {
        return Err(EngineError::InsufficientData {
            symbol: series.symbol().to_string(),
            required: window + 1,
            available: series.len(),
        });
    }
    let first_step = config.first_step.unwrap_or(window).max(window);
    if first_step >= series.len() {
        return Err(EngineError::InvalidFirstStep {
            first_step,
            len: series.len(),
        });
    }

    let total = series.len() - first_step;
    let model_name = model.name();
    let started = Instant::now();
    info!(
        symbol = series.symbol(),
        model = %model_name,
        window,
        first_step,
        steps = total,
        parallel = config.parallel,
        "starting rolling backtest"
    );

    let outcomes = if config.parallel {
        run_parallel(series, window, first_step, model, cancel)?
    } else {
        run_sequential(series, window, first_step, model, config, cancel)?
    };

    let mut ledger = ForecastLedger::with_capacity(outcomes.len());
    let mut skipped = Vec::new();
    for outcome in outcomes {
        match outcome {
            StepOutcome::Recorded(record) => ledger.push(record),
            StepOutcome::Skipped(step) => {
                warn!(
                    symbol = series.symbol(),
                    step = step.step_index,
                    date = %step.date,
                    reason = %step.reason,
                    "skipping step"
                );
                skipped.push(step);
            }
        }
    }

    info!(
        symbol = series.symbol(),
        recorded = ledger.len(),
        skipped = skipped.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "rolling backtest finished"
    );

    let metadata = RunMetadata {
        symbol: series.symbol().to_string(),
        interval: series.interval(),
        model: model_name,
        window,
        first_step,
        total_steps: total,
        skipped,
        period_start: ledger.first().map(|r| r.date),
        period_end: ledger.last().map(|r| r.date),
    };
    Ok(BacktestRun { ledger, metadata })
}

fn check_window(window: usize) -> Result<(), EngineError> {
    if window < MIN_WINDOW {
        return Err(EngineError::InvalidWindow { window });
    }
    Ok(())
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|f| f.load(Ordering::Relaxed))
}

// ─── Step evaluation ─────────────────────────────────────────────────

/// Fit on `[index - window, index)` and forecast `index`.
///
/// The model only ever receives the window slice, so nothing at or after
/// `index` can reach it.
pub(crate) fn evaluate_step(
    series: &TimeSeries,
    window: usize,
    index: usize,
    model: &dyn ForecastModel,
) -> StepOutcome {
    let target = series.points()[index];
    let skip = |reason: ModelFitError| {
        StepOutcome::Skipped(SkippedStep {
            step_index: index,
            date: target.date,
            reason,
        })
    };

    let Some(slice) = series.window(index, window) else {
        return skip(ModelFitError::TooShort {
            needed: window,
            got: index,
        });
    };
    let reference = match slice.last() {
        Some(point) => point.price,
        None => {
            return skip(ModelFitError::TooShort {
                needed: window,
                got: 0,
            })
        }
    };

    let forecast = match model.fit(&slice) {
        Ok(fitted) => fitted.predict_next(),
        Err(reason) => return skip(reason),
    };
    if !forecast.is_finite() {
        return skip(ModelFitError::NonFinite);
    }

    StepOutcome::Recorded(ForecastRecord {
        step_index: index,
        date: target.date,
        actual_price: target.price,
        predicted_price: forecast,
        reference_price: reference,
        signal: Signal::from_forecast(forecast, reference),
    })
}

fn run_sequential(
    series: &TimeSeries,
    window: usize,
    first_step: usize,
    model: &dyn ForecastModel,
    config: &EngineConfig,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<StepOutcome>, EngineError> {
    let total = series.len() - first_step;
    let mut outcomes = Vec::with_capacity(total);
    for index in first_step..series.len() {
        if is_cancelled(cancel) {
            return Err(EngineError::Cancelled {
                completed: outcomes.len(),
                total,
            });
        }
        outcomes.push(evaluate_step(series, window, index, model));

        let done = outcomes.len();
        if config.progress_every > 0 && done % config.progress_every == 0 {
            debug!(symbol = series.symbol(), done, total, "rolling progress");
        }
    }
    Ok(outcomes)
}

fn run_parallel(
    series: &TimeSeries,
    window: usize,
    first_step: usize,
    model: &dyn ForecastModel,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<StepOutcome>, EngineError> {
    let total = series.len() - first_step;
    let results: Vec<Option<StepOutcome>> = (first_step..series.len())
        .into_par_iter()
        .map(|index| {
            if is_cancelled(cancel) {
                None
            } else {
                Some(evaluate_step(series, window, index, model))
            }
        })
        .collect();

    let completed = results.iter().filter(|r| r.is_some()).count();
    if completed < total {
        return Err(EngineError::Cancelled { completed, total });
    }
    Ok(results.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Interval, TimeSeries};
    use crate::model::Naive;
    use chrono::NaiveDate;

    fn series(prices: &[f64]) -> TimeSeries {
        TimeSeries::from_prices(
            "TEST",
            Interval::Daily,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            prices,
        )
        .unwrap()
    }

    #[test]
    fn window_below_two_is_invalid() {
        let s = series(&[1.0, 2.0, 3.0]);
        let err = run_rolling(&s, 1, &ModelSpec::Naive, &EngineConfig::default(), None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidWindow { window: 1 }));
    }

    #[test]
    fn series_not_longer_than_window_is_insufficient() {
        let s = series(&[1.0, 2.0, 3.0]);
        let err = run_rolling(&s, 3, &ModelSpec::Naive, &EngineConfig::default(), None).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientData {
                required: 4,
                available: 3,
                ..
            }
        ));
    }

    #[test]
    fn invalid_spec_is_rejected_before_running() {
        let s = series(&[1.0; 30]);
        let spec = ModelSpec::Arima { p: 0, d: 0, q: 0 };
        let err = run_rolling(&s, 20, &spec, &EngineConfig::default(), None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidModelSpec(ModelSpecError::EmptyOrder)));

        let err = run_rolling(&s, 5, &ModelSpec::default(), &EngineConfig::default(), None).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidModelSpec(ModelSpecError::WindowTooShort { .. })
        ));
    }

    #[test]
    fn naive_records_every_step() {
        let s = series(&[10.0, 11.0, 12.0, 11.0, 13.0]);
        let run = run_rolling(&s, 2, &ModelSpec::Naive, &EngineConfig::default(), None).unwrap();
        assert_eq!(run.ledger.len(), 3);
        assert_eq!(run.metadata.total_steps, 3);
        assert_eq!(run.metadata.skipped_steps(), 0);

        let first = run.ledger.first().unwrap();
        assert_eq!(first.step_index, 2);
        assert_eq!(first.actual_price, 12.0);
        assert_eq!(first.predicted_price, 11.0);
        assert_eq!(first.reference_price, 11.0);
        assert_eq!(first.signal, Signal::Short);
        assert_eq!(run.metadata.period_start, Some(s.points()[2].date));
        assert_eq!(run.metadata.period_end, s.last_date());
    }

    #[test]
    fn first_step_is_clamped_to_window() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let config = EngineConfig {
            first_step: Some(1),
            ..EngineConfig::default()
        };
        let run = run_with_model(&s, 3, &Naive, &config, None).unwrap();
        assert_eq!(run.metadata.first_step, 3);

        let config = EngineConfig {
            first_step: Some(6),
            ..EngineConfig::default()
        };
        assert!(matches!(
            run_with_model(&s, 3, &Naive, &config, None),
            Err(EngineError::InvalidFirstStep { .. })
        ));
    }

    #[test]
    fn cancelled_flag_stops_run() {
        let s = series(&[1.0, 2.0, 3.0, 4.0]);
        let flag = AtomicBool::new(true);
        for parallel in [false, true] {
            let config = EngineConfig {
                parallel,
                ..EngineConfig::default()
            };
            let err = run_with_model(&s, 2, &Naive, &config, Some(&flag)).unwrap_err();
            assert!(matches!(err, EngineError::Cancelled { completed: 0, total: 2 }));
        }
    }
}
