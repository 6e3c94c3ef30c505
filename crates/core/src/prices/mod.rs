//! Price cache module.
//!
//! This module provides the engine that serves historical daily prices:
//!
//! - [`model`] - Cache entries, request ranges and batch results
//! - [`store`] - Persistent store trait
//! - [`fast_cache`] - Bounded, TTL-limited in-process cache
//! - [`fetch_lock`] - Per-ticker lock registry
//! - [`service`] - The orchestrator and consumer API
//! - [`table`] - Date-aligned multi-ticker tables
//! - [`errors`] - Per-ticker, request-level and storage errors
//!
//! # Architecture
//!
//! ```text
//! PriceService ──> FetchLocks (per ticker)
//!      │
//!      ├──> FastCache ──> PriceStore (durable) ──> MarketDataProvider
//!      │
//!      └──> BatchFetchResult { series, failed, unpersisted }
//! ```
//!
//! The store and provider are traits, so tests inject in-memory fakes and
//! the application wires in the file store and Alpha Vantage.

pub mod config;
pub mod constants;
pub mod errors;
pub mod fast_cache;
pub mod fetch_lock;
pub mod model;
pub mod service;
pub mod store;
pub mod table;


pub use config::PriceServiceConfig;
pub use errors::{FetchError, FetchErrorKind, PriceError, StorageError};
pub use fast_cache::{FastCache, FastCacheConfig};
pub use fetch_lock::{FetchGuard, FetchLocks};
pub use model::{
    BatchFetchResult, CacheEntry, CacheInfo, DateRange, Resolution, ResolutionSource,
};
pub use service::{PriceService, PriceServiceTrait};
pub use store::PriceStore;
pub use table::PriceTable;
