//! Error types for price resolution and cache persistence.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use pricecache_market_data::{MarketDataError, RetryClass, Ticker};

/// Why a single ticker could not be resolved.
///
/// Per-ticker failures are collected into the batch result and never abort
/// sibling tickers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The provider call failed, or the ticker was rejected before calling it.
    #[error(transparent)]
    Provider(#[from] MarketDataError),

    /// The requested start predates all history the provider has for this
    /// ticker. Only a narrower request can succeed.
    #[error(
        "Requested start {requested_start} for '{ticker}' predates the earliest available date {first_available}"
    )]
    CacheDateRange {
        ticker: Ticker,
        requested_start: NaiveDate,
        first_available: NaiveDate,
    },

    /// The per-ticker timeout fired. In-flight work was dropped.
    #[error("Resolution of '{ticker}' timed out after {after:?}")]
    Timeout { ticker: Ticker, after: Duration },

    /// The batch deadline fired before this ticker completed.
    #[error("Batch deadline passed before '{ticker}' was resolved")]
    BatchDeadline { ticker: Ticker },

    /// The resolution task panicked or ended without a result.
    #[error("Resolution of '{ticker}' aborted: {message}")]
    Aborted { ticker: Ticker, message: String },
}

/// Flat classification of [`FetchError`] for callers that branch on the
/// kind of failure rather than its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    InvalidTicker,
    RateLimited,
    TransportError,
    EmptyResult,
    CacheDateRangeError,
    InvalidSeries,
    Timeout,
    Aborted,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Provider(error) => match error {
                MarketDataError::InvalidTicker { .. } => FetchErrorKind::InvalidTicker,
                MarketDataError::RateLimited { .. } => FetchErrorKind::RateLimited,
                // An HTTP-level timeout is a transport failure
                MarketDataError::Transport { .. } | MarketDataError::Timeout { .. } => {
                    FetchErrorKind::TransportError
                }
                MarketDataError::EmptyResult { .. } => FetchErrorKind::EmptyResult,
                MarketDataError::InvalidSeries { .. } => FetchErrorKind::InvalidSeries,
            },
            Self::CacheDateRange { .. } => FetchErrorKind::CacheDateRangeError,
            Self::Timeout { .. } | Self::BatchDeadline { .. } => FetchErrorKind::Timeout,
            Self::Aborted { .. } => FetchErrorKind::Aborted,
        }
    }

    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Provider(error) => error.retry_class(),
            Self::CacheDateRange { .. } | Self::Aborted { .. } => RetryClass::Never,
            Self::Timeout { .. } | Self::BatchDeadline { .. } => RetryClass::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retry_class().is_retryable()
    }
}

/// Request-level failures.
///
/// Partial batch failure is not an error; only an empty or invalid request,
/// or a batch where every ticker failed, ends up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("No tickers requested")]
    EmptyRequest,

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Every requested ticker failed. Keys are normalized tickers, or the raw
    /// input when it could not be parsed.
    #[error("All {} requested tickers failed", .failed.len())]
    AllTickersFailed { failed: BTreeMap<String, FetchError> },

    /// Single-ticker request failed.
    #[error(transparent)]
    Ticker(#[from] FetchError),
}

/// Persistent store failures.
///
/// `WriteFailed` is the durability-only failure: the engine logs it and keeps
/// serving the freshly fetched series.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Failed to read cache entry for '{ticker}': {message}")]
    ReadFailed { ticker: String, message: String },

    #[error("Failed to persist cache entry for '{ticker}': {message}")]
    WriteFailed { ticker: String, message: String },

    #[error("Corrupt cache entry for '{ticker}': {message}")]
    Corrupt { ticker: String, message: String },

    #[error("Cache storage I/O failed: {0}")]
    Io(String),
}
