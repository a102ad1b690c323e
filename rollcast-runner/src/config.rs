//! Serializable backtest configuration (TOML).
//!
//! ```toml
//! [backtest]
//! window = 100
//! interval = "weekly"
//! start_date = "2015-01-01"
//! end_date = "2024-12-31"
//! train_ratio = 0.7
//!
//! [model]
//! kind = "arima"
//! p = 2
//! d = 1
//! q = 2
//!
//! [fit]
//! max_iterations = 50
//! timeout_ms = 2000
//! tolerance = 1e-6
//!
//! [batch]
//! threads = 0
//! top_n = 5
//! parallel_steps = false
//! rank_by = "strategy_return"
//! ```
//!
//! Every section and key is optional; omitted values take the defaults above
//! (no train ratio by default).

use chrono::NaiveDate;
use rollcast_core::domain::Interval;
use rollcast_core::engine::{EngineConfig, MIN_WINDOW};
use rollcast_core::model::{FitBudget, ModelSpec, ModelSpecError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::leaderboard::RankingMetric;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("window {0} is too small: must be at least {MIN_WINDOW}", MIN_WINDOW = MIN_WINDOW)]
    WindowTooSmall(usize),

    #[error("train_ratio {0} must be strictly between 0 and 1")]
    TrainRatio(f64),

    #[error("start date {start} is after end date {end}")]
    DateRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid model: {0}")]
    Model(#[from] ModelSpecError),

    #[error("fit {field} must be positive")]
    FitBudget { field: &'static str },

    #[error("top_n must be at least 1")]
    TopN,
}

// ─── Sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub window: usize,
    pub interval: Interval,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Split mode: forecasts start at `max(window, floor(len * train_ratio))`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_ratio: Option<f64>,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            window: 100,
            interval: Interval::Weekly,
            start_date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            train_ratio: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSection {
    pub max_iterations: usize,
    pub timeout_ms: u64,
    pub tolerance: f64,
}

impl Default for FitSection {
    fn default() -> Self {
        let budget = FitBudget::default();
        Self {
            max_iterations: budget.max_iterations,
            timeout_ms: budget.timeout.as_millis() as u64,
            tolerance: budget.tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// Worker threads for per-symbol runs; 0 uses the rayon default.
    pub threads: usize,
    /// Entries in each of the top and bottom rankings.
    pub top_n: usize,
    /// Also parallelize steps inside each symbol's run.
    pub parallel_steps: bool,
    /// Metric ordering the top and bottom rankings.
    pub rank_by: RankingMetric,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            threads: 0,
            top_n: 5,
            parallel_steps: false,
            rank_by: RankingMetric::StrategyReturn,
        }
    }
}

// ─── Top level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub model: ModelSpec,
    pub fit: FitSection,
    pub batch: BatchSection,
}

impl BacktestConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.backtest;
        if b.window < MIN_WINDOW {
            return Err(ConfigError::WindowTooSmall(b.window));
        }
        if let Some(ratio) = b.train_ratio {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(ConfigError::TrainRatio(ratio));
            }
        }
        if b.start_date > b.end_date {
            return Err(ConfigError::DateRange {
                start: b.start_date,
                end: b.end_date,
            });
        }
        self.model.validate_for_window(b.window)?;
        if self.fit.timeout_ms == 0 {
            return Err(ConfigError::FitBudget { field: "timeout_ms" });
        }
        if !(self.fit.tolerance.is_finite() && self.fit.tolerance >= 0.0) {
            return Err(ConfigError::FitBudget { field: "tolerance" });
        }
        if self.batch.top_n == 0 {
            return Err(ConfigError::TopN);
        }
        Ok(())
    }

    pub fn fit_budget(&self) -> FitBudget {
        FitBudget {
            max_iterations: self.fit.max_iterations,
            timeout: Duration::from_millis(self.fit.timeout_ms),
            tolerance: self.fit.tolerance,
        }
    }

    /// Engine settings for a series of `series_len` points.
    pub fn engine_config(&self, series_len: usize, parallel: bool) -> EngineConfig {
        EngineConfig {
            fit_budget: self.fit_budget(),
            parallel,
            first_step: self
                .backtest
                .train_ratio
                .map(|ratio| split_start(series_len, self.backtest.window, ratio)),
            ..EngineConfig::default()
        }
    }
}

/// First forecast index in split mode.
pub fn split_start(len: usize, window: usize, train_ratio: f64) -> usize {
    let train_len = (len as f64 * train_ratio).floor() as usize;
    train_len.max(window)
}
