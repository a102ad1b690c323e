//! Domain types: price series, windows, forecast records and signals.

pub mod ledger;
pub mod series;

pub use ledger::{ForecastLedger, ForecastRecord, LedgerError, Signal};
pub use series::{Interval, PricePoint, SeriesError, TimeSeries, WindowSlice};
