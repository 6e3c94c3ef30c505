//! File-backed storage for the price cache.
//!
//! This crate implements the `PriceStore` trait from `pricecache-core` on a
//! plain directory: one JSON document per ticker, replaced atomically on
//! every write.
//!
//! ```text
//! PriceService ──> PriceStore (trait, core)
//!                        │
//!                        ▼
//!                FilePriceStore (this crate)
//!                        │
//!                        ▼
//!            <cache dir>/<TICKER>.json
//! ```

mod record;
mod store;

pub use record::{CacheRecord, RECORD_VERSION};
pub use store::FilePriceStore;

// Re-export the store contract for convenience
pub use pricecache_core::{PriceStore, StorageError};
