//! Data access: price sources, series cache, universes.

pub mod cache;
pub mod csv_source;
pub mod provider;
pub mod synthetic;
pub mod universe;

pub use cache::{Fingerprint, SeriesCache};
pub use csv_source::CsvDirectorySource;
pub use provider::{DataUnavailable, PriceSource, SeriesRequest};
pub use synthetic::SyntheticSource;
pub use universe::{Universe, UniverseError};
