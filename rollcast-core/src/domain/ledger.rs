//! Forecast ledger — one record per successfully forecast step.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Directional call derived from a one-step forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Long,
    Short,
}

impl Signal {
    /// Long only when the forecast is strictly above the reference price.
    /// A tie is treated as a Short call.
    pub fn from_forecast(forecast: f64, reference: f64) -> Self {
        if forecast > reference {
            Signal::Long
        } else {
            Signal::Short
        }
    }

    /// +1.0 for Long, -1.0 for Short.
    pub fn direction(self) -> f64 {
        match self {
            Signal::Long => 1.0,
            Signal::Short => -1.0,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Long => f.write_str("long"),
            Signal::Short => f.write_str("short"),
        }
    }
}

/// Outcome of one rolling step.
///
/// `reference_price` is the last observation inside the training window, so
/// `signal` is a pure function of `predicted_price` and `reference_price`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// Index of the forecast target in the input series.
    pub step_index: usize,
    pub date: NaiveDate,
    pub actual_price: f64,
    pub predicted_price: f64,
    pub reference_price: f64,
    pub signal: Signal,
}

impl ForecastRecord {
    /// Forecast error, actual minus predicted.
    pub fn error(&self) -> f64 {
        self.actual_price - self.predicted_price
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("record {index} ({current}) does not follow the previous record ({previous})")]
    NotIncreasing {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },
}

/// Append-only, date-ordered list of forecast records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForecastLedger {
    records: Vec<ForecastRecord>,
}

impl ForecastLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    /// Build a ledger from externally produced records, enforcing date order.
    pub fn from_records(records: Vec<ForecastRecord>) -> Result<Self, LedgerError> {
        for index in 1..records.len() {
            let previous = records[index - 1].date;
            let current = records[index].date;
            if current <= previous {
                return Err(LedgerError::NotIncreasing {
                    index,
                    previous,
                    current,
                });
            }
        }
        Ok(Self { records })
    }

    pub(crate) fn push(&mut self, record: ForecastRecord) {
        debug_assert!(self
            .records
            .last()
            .map_or(true, |last| last.date < record.date));
        self.records.push(record);
    }

    pub fn records(&self) -> &[ForecastRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ForecastRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&ForecastRecord> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&ForecastRecord> {
        self.records.last()
    }

    pub fn actual_prices(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.actual_price).collect()
    }

    pub fn predicted_prices(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.predicted_price).collect()
    }
}

impl<'a> IntoIterator for &'a ForecastLedger {
    type Item = &'a ForecastRecord;
    type IntoIter = std::slice::Iter<'a, ForecastRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
