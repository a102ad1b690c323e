//! Memoizing series cache.
//!
//! Wraps any [`PriceSource`] and remembers successful fetches keyed by a
//! [`Fingerprint`] of the request. Concurrent requests for the same
//! fingerprint share one in-flight fetch. Failures are not remembered, so a
//! later request tries the source again.

use super::provider::{DataUnavailable, PriceSource, SeriesRequest};
use crate::domain::{Interval, TimeSeries};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

/// Cache key: everything that determines a fetched series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub symbol: String,
    pub interval: Interval,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Fingerprint {
    pub fn of(request: &SeriesRequest) -> Self {
        Self {
            symbol: request.symbol.clone(),
            interval: request.interval,
            start: request.start,
            end: request.end,
        }
    }

    /// Short BLAKE3 digest, used to name the request in logs.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.symbol.as_bytes());
        hasher.update(self.interval.to_string().as_bytes());
        hasher.update(self.start.to_string().as_bytes());
        hasher.update(self.end.to_string().as_bytes());
        hasher.finalize().to_hex()[..16].to_string()
    }
}

type Slot = Arc<OnceLock<Result<Arc<TimeSeries>, DataUnavailable>>>;

pub struct SeriesCache<S> {
    source: S,
    entries: Mutex<HashMap<Fingerprint, Slot>>,
    fetches: AtomicUsize,
}

impl<S: PriceSource> SeriesCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of times the wrapped source was actually called.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Number of cached series.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Fingerprint, Slot>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Shared handle to the series, fetching it at most once per fingerprint.
    pub fn get(&self, request: &SeriesRequest) -> Result<Arc<TimeSeries>, DataUnavailable> {
        let key = Fingerprint::of(request);
        let slot = Arc::clone(self.lock().entry(key.clone()).or_default());

        let result = slot
            .get_or_init(|| {
                self.fetches.fetch_add(1, Ordering::Relaxed);
                debug!(symbol = %key.symbol, key = %key.digest(), "cache miss");
                self.source.fetch(request).map(Arc::new)
            })
            .clone();

        if result.is_err() {
            let mut entries = self.lock();
            if entries.get(&key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
                entries.remove(&key);
            }
        }
        result
    }
}

impl<S: PriceSource> PriceSource for SeriesCache<S> {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn fetch(&self, request: &SeriesRequest) -> Result<TimeSeries, DataUnavailable> {
        self.get(request).map(|series| series.as_ref().clone())
    }
}
