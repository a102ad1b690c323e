//! Signal-to-return translation.
//!
//! The signal attached to record `k-1` (decided from information available
//! before `k-1`'s price was seen) is applied to the realized move from record
//! `k-1` to record `k`. Consecutive records are adjacent ledger entries, so
//! when steps were skipped the move spans the gap.

use crate::domain::{ForecastLedger, Signal};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("need at least 2 forecast records to compute returns, found {found}")]
    InsufficientRecords { found: usize },
}

/// One realized period return and what the strategy earned on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReturnPoint {
    /// Date of the later record (the end of the period).
    pub date: NaiveDate,
    pub actual_return: f64,
    pub strategy_return: f64,
    /// Signal of the earlier record.
    pub applied_signal: Signal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReturnSeries {
    points: Vec<ReturnPoint>,
    /// Periods dropped because the earlier price was zero.
    excluded_points: usize,
}

impl ReturnSeries {
    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn excluded_points(&self) -> usize {
        self.excluded_points
    }

    pub fn actual_returns(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.actual_return).collect()
    }

    pub fn strategy_returns(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.strategy_return).collect()
    }
}

/// Turn a ledger into per-period returns.
///
/// A ledger of `n >= 2` records yields `n - 1` points, less any period whose
/// starting price is zero.
pub fn translate(ledger: &ForecastLedger) -> Result<ReturnSeries, TranslateError> {
    let records = ledger.records();
    if records.len() < 2 {
        return Err(TranslateError::InsufficientRecords {
            found: records.len(),
        });
    }

    let mut series = ReturnSeries {
        points: Vec::with_capacity(records.len() - 1),
        excluded_points: 0,
    };
    for pair in records.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        if prev.actual_price == 0.0 {
            series.excluded_points += 1;
            continue;
        }
        let actual_return = (curr.actual_price - prev.actual_price) / prev.actual_price;
        series.points.push(ReturnPoint {
            date: curr.date,
            actual_return,
            strategy_return: prev.signal.direction() * actual_return,
            applied_signal: prev.signal,
        });
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ForecastRecord;

    fn ledger(rows: &[(f64, Signal)]) -> ForecastLedger {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let records = rows
            .iter()
            .zip(start.iter_days())
            .enumerate()
            .map(|(i, (&(actual, signal), date))| ForecastRecord {
                step_index: i,
                date,
                actual_price: actual,
                predicted_price: actual,
                reference_price: actual,
                signal,
            })
            .collect();
        ForecastLedger::from_records(records).unwrap()
    }

    #[test]
    fn earlier_signal_applies_to_next_move() {
        let l = ledger(&[
            (100.0, Signal::Long),
            (110.0, Signal::Short),
            (99.0, Signal::Long),
        ]);
        let r = translate(&l).unwrap();
        assert_eq!(r.len(), 2);

        let p0 = r.points()[0];
        assert!((p0.actual_return - 0.10).abs() < 1e-12);
        assert!((p0.strategy_return - 0.10).abs() < 1e-12);
        assert_eq!(p0.applied_signal, Signal::Long);

        let p1 = r.points()[1];
        assert!((p1.actual_return + 0.10).abs() < 1e-12);
        assert!((p1.strategy_return - 0.10).abs() < 1e-12);
        assert_eq!(p1.applied_signal, Signal::Short);
    }

    #[test]
    fn fewer_than_two_records_fail() {
        assert_eq!(
            translate(&ForecastLedger::new()),
            Err(TranslateError::InsufficientRecords { found: 0 })
        );
        assert_eq!(
            translate(&ledger(&[(1.0, Signal::Long)])),
            Err(TranslateError::InsufficientRecords { found: 1 })
        );
    }

    #[test]
    fn zero_previous_price_is_excluded() {
        let l = ledger(&[(0.0, Signal::Long), (5.0, Signal::Long), (10.0, Signal::Short)]);
        let r = translate(&l).unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r.excluded_points(), 1);
        assert!((r.actual_returns()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn strategy_magnitude_matches_actual() {
        let l = ledger(&[(50.0, Signal::Short), (40.0, Signal::Long), (44.0, Signal::Short)]);
        let r = translate(&l).unwrap();
        for p in r.points() {
            assert!((p.strategy_return.abs() - p.actual_return.abs()).abs() < 1e-15);
        }
    }
}
