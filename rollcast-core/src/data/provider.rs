//! Price source trait and structured error types.
//!
//! The PriceSource trait abstracts over where series come from (CSV files,
//! synthetic generation, a memoizing cache in front of either) so the runner
//! can swap implementations and mock them in tests.

use crate::domain::{Interval, TimeSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to load: one symbol over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesRequest {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: Interval,
}

impl SeriesRequest {
    pub fn new(symbol: impl Into<String>, start: NaiveDate, end: NaiveDate, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end,
            interval,
        }
    }
}

/// The series could not be produced. Never retried by the core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataUnavailable {
    #[error("no price data found for '{symbol}'")]
    NotFound { symbol: String },

    #[error("failed to read price data for '{symbol}': {reason}")]
    Io { symbol: String, reason: String },

    #[error("malformed price data for '{symbol}': {reason}")]
    Malformed { symbol: String, reason: String },

    #[error("no observations for '{symbol}' between {start} and {end}")]
    EmptyRange {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl DataUnavailable {
    pub fn symbol(&self) -> &str {
        match self {
            DataUnavailable::NotFound { symbol }
            | DataUnavailable::Io { symbol, .. }
            | DataUnavailable::Malformed { symbol, .. }
            | DataUnavailable::EmptyRange { symbol, .. } => symbol,
        }
    }
}

/// Anything that can produce a validated [`TimeSeries`] for a request.
pub trait PriceSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn fetch(&self, request: &SeriesRequest) -> Result<TimeSeries, DataUnavailable>;
}
