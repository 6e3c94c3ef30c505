//! In-process cache in front of the persistent store.
//!
//! Bounded by entry count and by age. Expired entries are dropped lazily when
//! read. When full, the entry inserted longest ago is evicted. A single mutex
//! guards the map; every operation is a lookup or an `Arc` swap.

use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use pricecache_market_data::Ticker;

use super::constants::{DEFAULT_FAST_CACHE_CAPACITY, DEFAULT_FAST_CACHE_TTL};
use super::model::CacheEntry;

/// Fast cache sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastCacheConfig {
    /// Maximum number of entries. Zero disables the cache.
    pub capacity: usize,
    /// Age after which an entry reads as absent.
    pub ttl: Duration,
}

impl Default for FastCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_FAST_CACHE_CAPACITY,
            ttl: DEFAULT_FAST_CACHE_TTL,
        }
    }
}

struct Slot {
    entry: CacheEntry,
    inserted_at: Instant,
}

/// Bounded, TTL-limited map of ticker to cache entry.
pub struct FastCache {
    config: FastCacheConfig,
    slots: Mutex<HashMap<Ticker, Slot>>,
}

impl FastCache {
    pub fn new(config: FastCacheConfig) -> Self {
        Self {
            slots: Mutex::new(HashMap::with_capacity(config.capacity)),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Ticker, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| {
            warn!("Fast cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Entry and its insertion time, if present and younger than the TTL.
    pub fn get(&self, ticker: &Ticker) -> Option<(CacheEntry, Instant)> {
        let mut slots = self.lock();

        let expired = match slots.get(ticker) {
            None => return None,
            Some(slot) => slot.inserted_at.elapsed() >= self.config.ttl,
        };

        if expired {
            debug!("Fast cache entry for {} expired", ticker);
            slots.remove(ticker);
            return None;
        }

        slots
            .get(ticker)
            .map(|slot| (slot.entry.clone(), slot.inserted_at))
    }

    /// Insert or replace the entry for its ticker, resetting its age.
    pub fn put(&self, entry: CacheEntry) {
        if self.config.capacity == 0 {
            return;
        }

        let ticker = entry.ticker().clone();
        let mut slots = self.lock();

        if !slots.contains_key(&ticker) && slots.len() >= self.config.capacity {
            let oldest = slots
                .iter()
                .min_by_key(|(_, slot)| slot.inserted_at)
                .map(|(ticker, _)| ticker.clone());
            if let Some(oldest) = oldest {
                debug!("Fast cache full, evicting {}", oldest);
                slots.remove(&oldest);
            }
        }

        slots.insert(
            ticker,
            Slot {
                entry,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Returns whether an entry was removed.
    pub fn remove(&self, ticker: &Ticker) -> bool {
        self.lock().remove(ticker).is_some()
    }

    /// Returns how many entries were removed.
    pub fn clear(&self) -> usize {
        let mut slots = self.lock();
        let count = slots.len();
        slots.clear();
        count
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn config(&self) -> &FastCacheConfig {
        &self.config
    }
}

impl Default for FastCache {
    fn default() -> Self {
        Self::new(FastCacheConfig::default())
    }
}
