//! Baseline forecasters. No estimation, so they never fail on a valid window.

use super::{FittedModel, ForecastModel, ModelFitError};
use crate::domain::WindowSlice;

/// Fitted baseline: the forecast is fixed at fit time.
#[derive(Debug, Clone, Copy)]
pub struct FixedForecast(pub f64);

impl FittedModel for FixedForecast {
    fn predict_next(&self) -> f64 {
        self.0
    }
}

fn require(window: &WindowSlice<'_>, needed: usize) -> Result<(), ModelFitError> {
    if window.len() < needed {
        Err(ModelFitError::TooShort {
            needed,
            got: window.len(),
        })
    } else {
        Ok(())
    }
}

/// Random walk: tomorrow equals today.
#[derive(Debug, Clone, Copy, Default)]
pub struct Naive;

impl ForecastModel for Naive {
    fn name(&self) -> String {
        "NAIVE".into()
    }

    fn fit(&self, window: &WindowSlice<'_>) -> Result<Box<dyn FittedModel>, ModelFitError> {
        require(window, 1)?;
        let last = window.last().map(|p| p.price).unwrap_or_default();
        Ok(Box::new(FixedForecast(last)))
    }
}

/// Random walk with drift estimated from the window's endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct Drift;

impl ForecastModel for Drift {
    fn name(&self) -> String {
        "DRIFT".into()
    }

    fn fit(&self, window: &WindowSlice<'_>) -> Result<Box<dyn FittedModel>, ModelFitError> {
        require(window, 2)?;
        let points = window.points();
        let first = points[0].price;
        let last = points[points.len() - 1].price;
        let drift = (last - first) / (points.len() - 1) as f64;
        Ok(Box::new(FixedForecast(last + drift)))
    }
}

/// Mean price of the window.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoricalMean;

impl ForecastModel for HistoricalMean {
    fn name(&self) -> String {
        "MEAN".into()
    }

    fn fit(&self, window: &WindowSlice<'_>) -> Result<Box<dyn FittedModel>, ModelFitError> {
        require(window, 1)?;
        let prices = window.prices();
        let mean = prices.iter().sum::<f64>() / prices.len() as f64;
        Ok(Box::new(FixedForecast(mean)))
    }
}
