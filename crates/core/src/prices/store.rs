//! Persistent price store trait.
//!
//! This module defines the storage interface for cache entries. One record is
//! kept per ticker; the backend (flat files, key-value store, SQL table) is
//! an implementation choice.

use async_trait::async_trait;

use pricecache_market_data::Ticker;

use super::errors::StorageError;
use super::model::{CacheEntry, CacheInfo};

// =============================================================================
// Price Store
// =============================================================================

/// Durable key to series storage.
///
/// # Contract
///
/// - `put` replaces the whole record atomically. A concurrent reader, or a
///   reader after a crash mid-write, sees either the previous record or the
///   new one, never a partial one.
/// - Records are never merged. A refetch overwrites.
/// - Implementations synchronize their own I/O; callers only serialize
///   writers per ticker through the fetch lock.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Point lookup by ticker.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no record exists. A record that exists but cannot be
    /// decoded is an error (`Corrupt`), not a miss.
    async fn get(&self, ticker: &Ticker) -> Result<Option<CacheEntry>, StorageError>;

    /// Atomically replace the record for `entry.ticker()`.
    ///
    /// # Errors
    ///
    /// `WriteFailed` when the record could not be made durable. The previous
    /// record, if any, is left intact.
    async fn put(&self, entry: &CacheEntry) -> Result<(), StorageError>;

    /// Remove one record. Returns whether it existed.
    async fn delete(&self, ticker: &Ticker) -> Result<bool, StorageError>;

    /// Remove every record. Returns how many were removed.
    async fn clear(&self) -> Result<usize, StorageError>;

    /// Metadata of every record, sorted by ticker.
    async fn list(&self) -> Result<Vec<CacheInfo>, StorageError>;
}
