//! Market data provider trait definitions.
//!
//! This module defines the `MarketDataProvider` trait that the price engine
//! calls on a cache miss.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{PriceSeries, Ticker};

use super::capabilities::RateLimit;

/// Trait for full-history daily price providers.
///
/// Implementations are stateless with respect to tickers and must be safe to
/// share across tasks. The engine serializes calls per ticker, never the
/// provider itself.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use pricecache_market_data::{MarketDataError, MarketDataProvider, PriceSeries, RateLimit, Ticker};
///
/// struct FixtureProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for FixtureProvider {
///     fn id(&self) -> &'static str {
///         "FIXTURE"
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::default()
///     }
///
///     async fn fetch_full_history(&self, ticker: &Ticker) -> Result<PriceSeries, MarketDataError> {
///         // ... load bars for ticker
///     }
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "ALPHA_VANTAGE".
    /// Used in error messages and logging.
    fn id(&self) -> &'static str;

    /// Rate limits advertised by this provider.
    fn rate_limit(&self) -> RateLimit;

    /// Fetch the complete daily history for a ticker.
    ///
    /// Issues exactly one upstream request. There is no range parameter: the
    /// provider always returns everything from the listing date onward.
    ///
    /// # Arguments
    ///
    /// * `ticker` - The normalized symbol to fetch
    ///
    /// # Returns
    ///
    /// A non-empty, validated series on success. Otherwise one of
    /// `InvalidTicker`, `RateLimited`, `Transport`, `Timeout`, `EmptyResult`
    /// or `InvalidSeries`.
    async fn fetch_full_history(&self, ticker: &Ticker) -> Result<PriceSeries, MarketDataError>;
}
