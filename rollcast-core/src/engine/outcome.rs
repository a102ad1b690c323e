//! Step outcomes and run metadata.

use crate::domain::{ForecastLedger, ForecastRecord, Interval};
use crate::model::ModelFitError;
use chrono::NaiveDate;
use serde::Serialize;

/// A step whose fit or forecast failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedStep {
    pub step_index: usize,
    pub date: NaiveDate,
    pub reason: ModelFitError,
}

/// What one rolling step produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Recorded(ForecastRecord),
    Skipped(SkippedStep),
}

impl StepOutcome {
    pub fn step_index(&self) -> usize {
        match self {
            StepOutcome::Recorded(r) => r.step_index,
            StepOutcome::Skipped(s) => s.step_index,
        }
    }
}

/// Everything about a run except the records themselves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub symbol: String,
    pub interval: Interval,
    pub model: String,
    pub window: usize,
    /// Index of the first forecast target.
    pub first_step: usize,
    /// Number of steps attempted.
    pub total_steps: usize,
    pub skipped: Vec<SkippedStep>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
}

impl RunMetadata {
    pub fn skipped_steps(&self) -> usize {
        self.skipped.len()
    }

    pub fn recorded_steps(&self) -> usize {
        self.total_steps - self.skipped.len()
    }

    pub fn skipped_indices(&self) -> Vec<usize> {
        self.skipped.iter().map(|s| s.step_index).collect()
    }
}

/// Output of the rolling engine for one series.
#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub ledger: ForecastLedger,
    pub metadata: RunMetadata,
}
