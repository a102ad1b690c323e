//! CSV directory source.
//!
//! Layout: `{dir}/{SYMBOL}.csv` with a header row. The date column is the
//! first of `date`, `Date`, `timestamp`, `Datetime`; the price column is the
//! first of `price`, `close`, `Close`, `adj_close`, `Adj Close`. Rows with an
//! empty price are dropped. Dates may carry a time suffix, only the leading
//! `YYYY-MM-DD` is used.

use super::provider::{DataUnavailable, PriceSource, SeriesRequest};
use crate::domain::{Interval, PricePoint, TimeSeries};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::debug;

const DATE_COLUMNS: &[&str] = &["date", "Date", "timestamp", "Datetime"];
const PRICE_COLUMNS: &[&str] = &["price", "close", "Close", "adj_close", "Adj Close"];

#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    dir: PathBuf,
    /// Sampling frequency of the files on disk.
    native_interval: Interval,
}

impl CsvDirectorySource {
    /// Files hold daily observations; coarser requests are resampled.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            native_interval: Interval::Daily,
        }
    }

    pub fn with_native_interval(mut self, interval: Interval) -> Self {
        self.native_interval = interval;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    fn read_points(&self, symbol: &str) -> Result<Vec<PricePoint>, DataUnavailable> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(DataUnavailable::NotFound {
                symbol: symbol.to_string(),
            });
        }
        let io = |e: csv::Error| DataUnavailable::Io {
            symbol: symbol.to_string(),
            reason: e.to_string(),
        };
        let malformed = |reason: String| DataUnavailable::Malformed {
            symbol: symbol.to_string(),
            reason,
        };

        let mut reader = csv::Reader::from_path(&path).map_err(io)?;
        let headers = reader.headers().map_err(io)?.clone();
        let find = |candidates: &[&str]| {
            candidates
                .iter()
                .find_map(|name| headers.iter().position(|h| h.trim() == *name))
        };
        let date_col = find(DATE_COLUMNS).ok_or_else(|| malformed("no date column".into()))?;
        let price_col = find(PRICE_COLUMNS).ok_or_else(|| malformed("no price column".into()))?;

        let mut points = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(io)?;
            let raw_price = record.get(price_col).unwrap_or("").trim();
            if raw_price.is_empty() {
                continue;
            }
            let raw_date = record.get(date_col).unwrap_or("").trim();
            let date = parse_date(raw_date)
                .ok_or_else(|| malformed(format!("row {}: bad date '{raw_date}'", row + 1)))?;
            let price: f64 = raw_price
                .parse()
                .map_err(|e| malformed(format!("row {}: bad price '{raw_price}': {e}", row + 1)))?;
            points.push(PricePoint::new(date, price));
        }
        Ok(points)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

impl PriceSource for CsvDirectorySource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, request: &SeriesRequest) -> Result<TimeSeries, DataUnavailable> {
        let points = self.read_points(&request.symbol)?;
        let series = TimeSeries::from_unsorted(&request.symbol, self.native_interval, points)
            .map_err(|e| DataUnavailable::Malformed {
                symbol: request.symbol.clone(),
                reason: e.to_string(),
            })?
            .between(request.start, request.end);

        let series = if request.interval == self.native_interval {
            series
        } else {
            series.resample(request.interval)
        };
        if series.is_empty() {
            return Err(DataUnavailable::EmptyRange {
                symbol: request.symbol.clone(),
                start: request.start,
                end: request.end,
            });
        }
        debug!(
            symbol = %request.symbol,
            points = series.len(),
            interval = %request.interval,
            "loaded csv series"
        );
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn request(symbol: &str, interval: Interval) -> SeriesRequest {
        SeriesRequest::new(symbol, d(2024, 1, 1), d(2024, 12, 31), interval)
    }

    #[test]
    fn reads_close_column_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("AAA.csv"),
            "Date,Open,Close\n2024-01-03,1,12.5\n2024-01-02,1,11.0\n2023-12-29,1,9.0\n",
        )
        .unwrap();
        let source = CsvDirectorySource::new(dir.path());
        let s = source.fetch(&request("AAA", Interval::Daily)).unwrap();
        assert_eq!(s.prices(), vec![11.0, 12.5]);
        assert_eq!(s.symbol(), "AAA");
    }

    #[test]
    fn skips_empty_prices_and_strips_time() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("BBB.csv"),
            "date,price\n2024-01-02 00:00:00+05:30,10\n2024-01-03,\n2024-01-04,11\n",
        )
        .unwrap();
        let s = CsvDirectorySource::new(dir.path())
            .fetch(&request("BBB", Interval::Daily))
            .unwrap();
        assert_eq!(s.prices(), vec![10.0, 11.0]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvDirectorySource::new(dir.path())
            .fetch(&request("NOPE", Interval::Daily))
            .unwrap_err();
        assert_eq!(err, DataUnavailable::NotFound { symbol: "NOPE".into() });
    }

    #[test]
    fn missing_columns_and_bad_rows_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("X.csv"), "when,close\n2024-01-02,1\n").unwrap();
        fs::write(dir.path().join("Y.csv"), "date,close\n2024-01-02,abc\n").unwrap();
        fs::write(dir.path().join("Z.csv"), "date,close\n2024-01-02,-3\n").unwrap();
        let source = CsvDirectorySource::new(dir.path());
        for symbol in ["X", "Y", "Z"] {
            assert!(matches!(
                source.fetch(&request(symbol, Interval::Daily)),
                Err(DataUnavailable::Malformed { .. })
            ));
        }
    }

    #[test]
    fn zero_close_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("ZERO.csv"),
            "date,close\n2024-01-02,4\n2024-01-03,0\n2024-01-04,5\n",
        )
        .unwrap();
        let s = CsvDirectorySource::new(dir.path())
            .fetch(&request("ZERO", Interval::Daily))
            .unwrap();
        assert_eq!(s.prices(), vec![4.0, 0.0, 5.0]);
    }

    #[test]
    fn out_of_range_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("OLD.csv"), "date,close\n2001-01-02,5\n").unwrap();
        let err = CsvDirectorySource::new(dir.path())
            .fetch(&request("OLD", Interval::Daily))
            .unwrap_err();
        assert!(matches!(err, DataUnavailable::EmptyRange { .. }));
    }

    #[test]
    fn weekly_request_resamples_daily_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = String::from("date,close\n");
        for (i, date) in d(2024, 1, 1).iter_days().take(14).enumerate() {
            body.push_str(&format!("{date},{}\n", 100 + i));
        }
        fs::write(dir.path().join("W.csv"), body).unwrap();
        let s = CsvDirectorySource::new(dir.path())
            .fetch(&request("W", Interval::Weekly))
            .unwrap();
        assert_eq!(s.interval(), Interval::Weekly);
        assert_eq!(s.prices(), vec![106.0, 113.0]);
    }
}
