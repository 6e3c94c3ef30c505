//! Price Cache Core - the cache-and-fetch engine for daily price series.
//!
//! This crate decides cache hit vs. stale vs. miss, resolves tickers
//! concurrently with bounded parallelism and timeouts, and guards each ticker
//! against duplicate concurrent fetches. It is storage-agnostic: durable
//! persistence is a trait implemented by the `storage-fs` crate.

pub mod prices;

pub use prices::{
    BatchFetchResult, CacheEntry, CacheInfo, FetchError, FetchErrorKind, PriceError,
    PriceService, PriceServiceConfig, PriceServiceTrait, PriceStore, PriceTable, StorageError,
};

// Re-export the series model so consumers need a single dependency
pub use pricecache_market_data::{DailyBar, PriceField, PriceSeries, Ticker};
