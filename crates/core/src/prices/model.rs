//! Domain models for the price cache.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use pricecache_market_data::{PriceField, PriceSeries, Ticker};

use super::errors::{FetchError, PriceError};
use super::table::PriceTable;

// =============================================================================
// CacheEntry
// =============================================================================

/// One ticker's full fetched history with its bounds.
///
/// `first_date` and `last_date` are derived from the series at construction
/// and cannot be set independently. An entry is always replaced wholesale,
/// never merged.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    series: Arc<PriceSeries>,
    first_date: NaiveDate,
    last_date: NaiveDate,
    fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Returns `None` for an empty series, which has no bounds to cache.
    pub fn new(series: PriceSeries, fetched_at: DateTime<Utc>) -> Option<Self> {
        Self::from_shared(Arc::new(series), fetched_at)
    }

    pub fn from_shared(series: Arc<PriceSeries>, fetched_at: DateTime<Utc>) -> Option<Self> {
        let first_date = series.first_date()?;
        let last_date = series.last_date()?;
        Some(Self {
            series,
            first_date,
            last_date,
            fetched_at,
        })
    }

    pub fn ticker(&self) -> &Ticker {
        self.series.ticker()
    }

    pub fn series(&self) -> &Arc<PriceSeries> {
        &self.series
    }

    pub fn first_date(&self) -> NaiveDate {
        self.first_date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.last_date
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Whether the entry holds data up to `end`. When it does not, the entry
    /// is stale for that request.
    pub fn covers_end(&self, end: NaiveDate) -> bool {
        end <= self.last_date
    }

    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            ticker: self.ticker().clone(),
            first_date: self.first_date,
            last_date: self.last_date,
            fetched_at: self.fetched_at,
        }
    }
}

/// Metadata of a persisted entry, without the series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub ticker: Ticker,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub fetched_at: DateTime<Utc>,
}

// =============================================================================
// Requests and results
// =============================================================================

/// Inclusive date range of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PriceError> {
        if start > end {
            return Err(PriceError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }
}

/// Where a resolved series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    FastCache,
    Store,
    Provider,
}

/// Outcome of one successful ticker resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The series filtered to the requested range.
    pub series: PriceSeries,
    pub source: ResolutionSource,
    /// False when a fresh fetch could not be written to the persistent store.
    pub persisted: bool,
}

/// Aggregated result of a batch request.
///
/// Failed tickers are an expected outcome. Callers decide whether to drop the
/// instrument or abort their computation.
#[derive(Debug, Clone, Default)]
pub struct BatchFetchResult {
    /// Successful series, each filtered to the requested range.
    pub series: BTreeMap<Ticker, PriceSeries>,
    /// Failures keyed by normalized ticker (raw input when it did not parse).
    pub failed: BTreeMap<String, FetchError>,
    /// Tickers fetched successfully whose persistent write failed.
    pub unpersisted: BTreeSet<Ticker>,
}

impl BatchFetchResult {
    pub fn failed_tickers(&self) -> Vec<&str> {
        self.failed.keys().map(String::as_str).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn get(&self, ticker: &str) -> Option<&PriceSeries> {
        let ticker = Ticker::parse(ticker).ok()?;
        self.series.get(&ticker)
    }

    /// Date-aligned table of one field across all successful tickers.
    pub fn table(&self, field: PriceField) -> PriceTable {
        PriceTable::from_series(field, self.series.values())
    }
}
