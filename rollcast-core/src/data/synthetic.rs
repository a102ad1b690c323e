//! Synthetic price source.
//!
//! Geometric random walk per symbol. The RNG seed is derived from
//! `(master_seed, symbol)` via BLAKE3, so a symbol's path does not depend on
//! which other symbols were generated or in what order.

use super::provider::{DataUnavailable, PriceSource, SeriesRequest};
use crate::domain::{Interval, PricePoint, TimeSeries};
use chrono::{Datelike, Months, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    master_seed: u64,
    start_price: f64,
    /// Mean log return per period.
    drift: f64,
    /// Standard deviation of log returns per period.
    volatility: f64,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(42)
    }
}

impl SyntheticSource {
    pub fn new(master_seed: u64) -> Self {
        Self {
            master_seed,
            start_price: 100.0,
            drift: 0.001,
            volatility: 0.02,
        }
    }

    pub fn with_dynamics(mut self, start_price: f64, drift: f64, volatility: f64) -> Self {
        self.start_price = start_price;
        self.drift = drift;
        self.volatility = volatility;
        self
    }

    /// Seed for a symbol, independent of generation order.
    pub fn seed_for(&self, symbol: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }
}

/// Observation dates in `[start, end]`: weekdays, Fridays, or month starts.
fn calendar(start: NaiveDate, end: NaiveDate, interval: Interval) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    match interval {
        Interval::Daily => {
            dates.extend(
                start
                    .iter_days()
                    .take_while(|d| *d <= end)
                    .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)),
            );
        }
        Interval::Weekly => {
            let offset = (7 + Weekday::Fri.num_days_from_monday()
                - start.weekday().num_days_from_monday())
                % 7;
            let first = start + chrono::Duration::days(i64::from(offset));
            dates.extend(first.iter_weeks().take_while(|d| *d <= end));
        }
        Interval::Monthly => {
            let mut current = start.with_day(1).unwrap_or(start);
            if current < start {
                current = current + Months::new(1);
            }
            while current <= end {
                dates.push(current);
                current = current + Months::new(1);
            }
        }
    }
    dates
}

/// Standard normal draw via Box–Muller.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

impl PriceSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, request: &SeriesRequest) -> Result<TimeSeries, DataUnavailable> {
        let dates = calendar(request.start, request.end, request.interval);
        if dates.is_empty() {
            return Err(DataUnavailable::EmptyRange {
                symbol: request.symbol.clone(),
                start: request.start,
                end: request.end,
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed_for(&request.symbol));
        let mut price = self.start_price;
        let points = dates
            .into_iter()
            .map(|date| {
                let point = PricePoint::new(date, price);
                price *= (self.drift + self.volatility * standard_normal(&mut rng)).exp();
                point
            })
            .collect();

        TimeSeries::new(&request.symbol, request.interval, points).map_err(|e| {
            DataUnavailable::Malformed {
                symbol: request.symbol.clone(),
                reason: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn request(symbol: &str, interval: Interval) -> SeriesRequest {
        SeriesRequest::new(symbol, d(2024, 1, 1), d(2024, 12, 31), interval)
    }

    #[test]
    fn same_seed_same_path() {
        let a = SyntheticSource::new(7).fetch(&request("AAA", Interval::Weekly)).unwrap();
        let b = SyntheticSource::new(7).fetch(&request("AAA", Interval::Weekly)).unwrap();
        assert_eq!(a, b);

        let other = SyntheticSource::new(7).fetch(&request("BBB", Interval::Weekly)).unwrap();
        assert_ne!(a.prices(), other.prices());
        let reseeded = SyntheticSource::new(8).fetch(&request("AAA", Interval::Weekly)).unwrap();
        assert_ne!(a.prices(), reseeded.prices());
    }

    #[test]
    fn calendars_match_interval() {
        let weekly = SyntheticSource::default().fetch(&request("W", Interval::Weekly)).unwrap();
        assert_eq!(weekly.len(), 52);
        assert!(weekly.points().iter().all(|p| p.date.weekday() == Weekday::Fri));

        let monthly = SyntheticSource::default().fetch(&request("M", Interval::Monthly)).unwrap();
        assert_eq!(monthly.len(), 12);

        let daily = SyntheticSource::default().fetch(&request("D", Interval::Daily)).unwrap();
        assert_eq!(daily.len(), 262);
        assert_eq!(daily.points()[0].price, 100.0);
    }

    #[test]
    fn empty_range_is_unavailable() {
        let req = SeriesRequest::new("E", d(2024, 1, 6), d(2024, 1, 7), Interval::Daily);
        assert!(matches!(
            SyntheticSource::default().fetch(&req),
            Err(DataUnavailable::EmptyRange { .. })
        ));
    }
}
