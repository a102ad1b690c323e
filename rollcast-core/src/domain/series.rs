//! Price series — the ordered, validated input every run consumes.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Sampling frequency of a price series.
///
/// Only used to annualise risk-adjusted metrics and to resample daily
/// sources; the engine itself never looks at calendar spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

impl Interval {
    /// Observations per calendar year.
    pub fn periods_per_year(self) -> f64 {
        match self {
            Interval::Daily => 252.0,
            Interval::Weekly => 52.0,
            Interval::Monthly => 12.0,
        }
    }

    /// Bucket key used when collapsing a finer series to this interval.
    fn bucket(self, date: NaiveDate) -> (i32, u32) {
        match self {
            Interval::Daily => (date.year(), date.ordinal()),
            Interval::Weekly => {
                let iso = date.iso_week();
                (iso.year(), iso.week())
            }
            Interval::Monthly => (date.year(), date.month()),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Interval::Daily => "daily",
            Interval::Weekly => "weekly",
            Interval::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" | "1d" => Ok(Interval::Daily),
            "weekly" | "1wk" => Ok(Interval::Weekly),
            "monthly" | "1mo" => Ok(Interval::Monthly),
            other => Err(format!("unknown interval '{other}' (expected daily, weekly or monthly)")),
        }
    }
}

/// One observation: a date and a non-negative finite price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("point {index} ({current}) is not after the previous point ({previous})")]
    OutOfOrder {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("duplicate observation for {date}")]
    DuplicateDate { date: NaiveDate },

    #[error("price on {date} must be finite and non-negative, got {price}")]
    InvalidPrice { date: NaiveDate, price: f64 },
}

/// Ordered sequence of prices for one symbol.
///
/// Dates are strictly increasing and every price is finite and non-negative.
/// A zero price is kept; downstream returns and MAPE exclude and count it.
/// Once constructed the series is never mutated; the engine only ever
/// borrows windows out of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    symbol: String,
    interval: Interval,
    points: Vec<PricePoint>,
}

impl TimeSeries {
    /// Build a series from points that must already be strictly ordered.
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        points: Vec<PricePoint>,
    ) -> Result<Self, SeriesError> {
        for (index, point) in points.iter().enumerate() {
            check_price(point)?;
            if index > 0 {
                let previous = points[index - 1].date;
                if point.date == previous {
                    return Err(SeriesError::DuplicateDate { date: point.date });
                }
                if point.date < previous {
                    return Err(SeriesError::OutOfOrder {
                        index,
                        previous,
                        current: point.date,
                    });
                }
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            interval,
            points,
        })
    }

    /// Build a series from loosely ordered points.
    ///
    /// Points are sorted by date; when a date repeats, the observation that
    /// came last in the input wins. Prices are still validated.
    pub fn from_unsorted(
        symbol: impl Into<String>,
        interval: Interval,
        mut points: Vec<PricePoint>,
    ) -> Result<Self, SeriesError> {
        for point in &points {
            check_price(point)?;
        }
        // Stable sort keeps input order among equal dates.
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Self::new(symbol, interval, deduped)
    }

    /// Convenience constructor for prices on consecutive days starting at `start`.
    pub fn from_prices(
        symbol: impl Into<String>,
        interval: Interval,
        start: NaiveDate,
        prices: &[f64],
    ) -> Result<Self, SeriesError> {
        let points = prices
            .iter()
            .zip(start.iter_days())
            .map(|(&price, date)| PricePoint::new(date, price))
            .collect();
        Self::new(symbol, interval, points)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&PricePoint> {
        self.points.get(index)
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// The `len` points immediately preceding `end` (exclusive).
    ///
    /// Returns `None` when the window would start before the first point or
    /// run past the end of the series.
    pub fn window(&self, end: usize, len: usize) -> Option<WindowSlice<'_>> {
        if len == 0 || end < len || end > self.points.len() {
            return None;
        }
        Some(WindowSlice {
            points: &self.points[end - len..end],
            start_index: end - len,
        })
    }

    /// Sub-series with dates inside `[start, end]`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> TimeSeries {
        TimeSeries {
            symbol: self.symbol.clone(),
            interval: self.interval,
            points: self
                .points
                .iter()
                .filter(|p| p.date >= start && p.date <= end)
                .copied()
                .collect(),
        }
    }

    /// Collapse to a coarser interval, keeping the last observation of each
    /// bucket (ISO week or calendar month).
    pub fn resample(&self, interval: Interval) -> TimeSeries {
        let mut points: Vec<PricePoint> = Vec::new();
        let mut current_bucket = None;
        for point in &self.points {
            let bucket = interval.bucket(point.date);
            if current_bucket == Some(bucket) {
                if let Some(last) = points.last_mut() {
                    *last = *point;
                }
            } else {
                points.push(*point);
                current_bucket = Some(bucket);
            }
        }
        TimeSeries {
            symbol: self.symbol.clone(),
            interval,
            points,
        }
    }
}

fn check_price(point: &PricePoint) -> Result<(), SeriesError> {
    if point.price.is_finite() && point.price >= 0.0 {
        Ok(())
    } else {
        Err(SeriesError::InvalidPrice {
            date: point.date,
            price: point.price,
        })
    }
}

/// Read-only view of the `W` observations a model is allowed to see.
#[derive(Debug, Clone, Copy)]
pub struct WindowSlice<'a> {
    points: &'a [PricePoint],
    start_index: usize,
}

impl<'a> WindowSlice<'a> {
    /// Wrap an arbitrary slice; mostly useful for fitting models directly.
    pub fn from_points(points: &'a [PricePoint]) -> Self {
        Self {
            points,
            start_index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &'a [PricePoint] {
        self.points
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    /// Index in the parent series of the first point.
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Index in the parent series one past the last point.
    pub fn end_index(&self) -> usize {
        self.start_index + self.points.len()
    }

    pub fn last(&self) -> Option<&'a PricePoint> {
        self.points.last()
    }

    pub fn first(&self) -> Option<&'a PricePoint> {
        self.points.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn new_accepts_ordered_points() {
        let s = TimeSeries::new(
            "AAA",
            Interval::Daily,
            vec![
                PricePoint::new(d(2024, 1, 1), 10.0),
                PricePoint::new(d(2024, 1, 2), 11.0),
            ],
        )
        .unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.symbol(), "AAA");
        assert_eq!(s.prices(), vec![10.0, 11.0]);
    }

    #[test]
    fn new_rejects_out_of_order() {
        let err = TimeSeries::new(
            "AAA",
            Interval::Daily,
            vec![
                PricePoint::new(d(2024, 1, 2), 10.0),
                PricePoint::new(d(2024, 1, 1), 11.0),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SeriesError::OutOfOrder { index: 1, .. }));
    }

    #[test]
    fn new_rejects_duplicates_and_bad_prices() {
        let dup = TimeSeries::new(
            "AAA",
            Interval::Daily,
            vec![
                PricePoint::new(d(2024, 1, 1), 10.0),
                PricePoint::new(d(2024, 1, 1), 11.0),
            ],
        );
        assert!(matches!(dup, Err(SeriesError::DuplicateDate { .. })));

        for bad in [-1.0, -0.01, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let r = TimeSeries::new("AAA", Interval::Daily, vec![PricePoint::new(d(2024, 1, 1), bad)]);
            assert!(matches!(r, Err(SeriesError::InvalidPrice { .. })), "{bad}");
        }
    }

    #[test]
    fn zero_price_is_accepted() {
        let s = TimeSeries::from_prices("AAA", Interval::Daily, d(2024, 1, 1), &[5.0, 0.0, 4.0]).unwrap();
        assert_eq!(s.prices(), vec![5.0, 0.0, 4.0]);

        let unsorted = TimeSeries::from_unsorted(
            "AAA",
            Interval::Daily,
            vec![PricePoint::new(d(2024, 1, 2), 0.0), PricePoint::new(d(2024, 1, 1), 3.0)],
        )
        .unwrap();
        assert_eq!(unsorted.prices(), vec![3.0, 0.0]);
    }

    #[test]
    fn from_unsorted_sorts_and_keeps_last_duplicate() {
        let s = TimeSeries::from_unsorted(
            "AAA",
            Interval::Daily,
            vec![
                PricePoint::new(d(2024, 1, 3), 3.0),
                PricePoint::new(d(2024, 1, 1), 1.0),
                PricePoint::new(d(2024, 1, 3), 30.0),
                PricePoint::new(d(2024, 1, 2), 2.0),
            ],
        )
        .unwrap();
        assert_eq!(s.prices(), vec![1.0, 2.0, 30.0]);
    }

    #[test]
    fn window_bounds() {
        let s = TimeSeries::from_prices("AAA", Interval::Daily, d(2024, 1, 1), &[1.0, 2.0, 3.0, 4.0])
            .unwrap();
        let w = s.window(3, 2).unwrap();
        assert_eq!(w.prices(), vec![2.0, 3.0]);
        assert_eq!(w.start_index(), 1);
        assert_eq!(w.end_index(), 3);
        assert!(s.window(1, 2).is_none());
        assert!(s.window(5, 2).is_none());
        assert!(s.window(2, 0).is_none());
    }

    #[test]
    fn resample_weekly_keeps_last_of_each_week() {
        // 2024-01-01 is a Monday.
        let prices: Vec<f64> = (1..=14).map(f64::from).collect();
        let s = TimeSeries::from_prices("AAA", Interval::Daily, d(2024, 1, 1), &prices).unwrap();
        let w = s.resample(Interval::Weekly);
        assert_eq!(w.interval(), Interval::Weekly);
        assert_eq!(w.prices(), vec![7.0, 14.0]);
        assert_eq!(w.points()[0].date, d(2024, 1, 7));
    }

    #[test]
    fn between_filters_inclusive() {
        let s = TimeSeries::from_prices("AAA", Interval::Daily, d(2024, 1, 1), &[1.0, 2.0, 3.0, 4.0])
            .unwrap();
        let sub = s.between(d(2024, 1, 2), d(2024, 1, 3));
        assert_eq!(sub.prices(), vec![2.0, 3.0]);
    }

    #[test]
    fn interval_parse_and_display() {
        assert_eq!("Weekly".parse::<Interval>().unwrap(), Interval::Weekly);
        assert_eq!("1d".parse::<Interval>().unwrap(), Interval::Daily);
        assert!("hourly".parse::<Interval>().is_err());
        assert_eq!(Interval::Monthly.to_string(), "monthly");
        assert_eq!(Interval::Weekly.periods_per_year(), 52.0);
    }
}
