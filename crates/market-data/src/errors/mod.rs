//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The error enum for provider calls and series validation
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while fetching or validating a price series.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method. Variants carry plain strings so the error can be cloned into every
/// waiter of a batch and compared in tests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    /// The provider does not know the symbol, or the symbol is malformed.
    /// This is a terminal error - retrying won't help.
    #[error("Invalid ticker '{ticker}': {message}")]
    InvalidTicker {
        /// The ticker as requested
        ticker: String,
        /// Provider message or validation reason
        message: String,
    },

    /// The provider returned a quota or frequency notice (or HTTP 429).
    /// Should retry after backing off.
    #[error("Rate limited by {provider}: {message}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
        /// The notice returned by the provider
        message: String,
    },

    /// Connection failure, non-2xx status, or a body that could not be classified.
    #[error("Transport error from {provider}: {message}")]
    Transport {
        /// The provider that was called
        provider: String,
        /// Description of the failure
        message: String,
    },

    /// The HTTP request timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A well-formed response with no daily rows.
    #[error("{provider} returned no data for '{ticker}'")]
    EmptyResult {
        /// The provider that was called
        provider: String,
        /// The requested ticker
        ticker: String,
    },

    /// The series contains a missing or non-finite value, a duplicate date,
    /// or a row that could not be parsed. The whole series is rejected.
    #[error("Invalid series for '{ticker}': {reason}")]
    InvalidSeries {
        /// The ticker the series belongs to
        ticker: String,
        /// What made the series invalid
        reason: String,
    },
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// - [`RetryClass::Never`]: unknown symbol or invalid series
    /// - [`RetryClass::WithBackoff`]: provider quota notice
    /// - [`RetryClass::Transient`]: transport failures, timeouts and empty results
    ///
    /// # Examples
    ///
    /// ```
    /// use pricecache_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited {
    ///     provider: "ALPHA_VANTAGE".to_string(),
    ///     message: "Thank you for using Alpha Vantage!".to_string(),
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::InvalidTicker { .. } | Self::InvalidSeries { .. } => RetryClass::Never,

            Self::RateLimited { .. } => RetryClass::WithBackoff,

            // Empty responses are treated like transport failures
            Self::Transport { .. } | Self::Timeout { .. } | Self::EmptyResult { .. } => {
                RetryClass::Transient
            }
        }
    }

    pub(crate) fn invalid_series(ticker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSeries {
            ticker: ticker.into(),
            reason: reason.into(),
        }
    }
}
