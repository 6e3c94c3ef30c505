//! Price service: the cache-and-fetch engine and its consumer API.
//!
//! Resolution of one ticker, under that ticker's fetch lock:
//!
//! ```text
//! FastCache ──hit (covers end)──────────────────────────────┐
//!     │ miss / stale                                        │
//!     v                                                     │
//! PriceStore ──hit (covers end)──> refresh FastCache ───────┤
//!     │ miss / stale / unreadable                           │
//!     v                                                     │
//! Provider ──ok──> PriceStore.put (non-fatal) ──> FastCache ┤
//!     │ error: nothing written                              v
//!     v                                          floor check ──> slice [start, end]
//!   FetchError
//! ```
//!
//! Batches fan out over a `JoinSet`; a service-wide semaphore caps how many
//! resolutions run at once.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use pricecache_market_data::{MarketDataError, MarketDataProvider, PriceSeries, Ticker};

use super::config::PriceServiceConfig;
use super::errors::{FetchError, PriceError, StorageError};
use super::fast_cache::FastCache;
use super::fetch_lock::FetchLocks;
use super::model::{
    BatchFetchResult, CacheEntry, CacheInfo, DateRange, Resolution, ResolutionSource,
};
use super::store::PriceStore;

// =============================================================================
// Service Trait
// =============================================================================

/// Consumer interface for historical daily prices.
#[async_trait]
pub trait PriceServiceTrait: Send + Sync {
    /// Resolve one ticker and return its series filtered to `[start, end]`.
    ///
    /// # Errors
    ///
    /// * `InvalidDateRange` - `start > end`
    /// * `Ticker(_)` - the ticker could not be resolved; see [`FetchError::kind`]
    async fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, PriceError>;

    /// Resolve many tickers concurrently.
    ///
    /// Partial failure is reported in [`BatchFetchResult::failed`], not as an
    /// error. Duplicate tickers (after normalization) resolve once.
    ///
    /// # Errors
    ///
    /// * `EmptyRequest` - no tickers given
    /// * `InvalidDateRange` - `start > end`
    /// * `AllTickersFailed` - nothing could be resolved
    async fn fetch_prices_batch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BatchFetchResult, PriceError>;

    /// Metadata of every persisted entry, sorted by ticker.
    async fn cache_info(&self) -> Result<Vec<CacheInfo>, StorageError>;

    /// Drop one ticker from both cache tiers. Returns whether a persisted
    /// entry existed.
    async fn invalidate(&self, ticker: &Ticker) -> Result<bool, StorageError>;

    /// Empty both cache tiers. Returns the number of persisted entries removed.
    async fn clear_cache(&self) -> Result<usize, StorageError>;
}

// =============================================================================
// Service
// =============================================================================

/// Cache-and-fetch engine.
///
/// Construct once at startup and share by cloning (all state is behind
/// `Arc`). Tests build a fresh instance each, so no state leaks between them.
#[derive(Clone)]
pub struct PriceService {
    provider: Arc<dyn MarketDataProvider>,
    store: Arc<dyn PriceStore>,
    fast_cache: Arc<FastCache>,
    locks: Arc<FetchLocks>,
    workers: Arc<Semaphore>,
    config: PriceServiceConfig,
}

impl PriceService {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<dyn PriceStore>,
        config: PriceServiceConfig,
    ) -> Self {
        let advertised = provider.rate_limit();
        if config.max_concurrent > advertised.max_concurrency {
            info!(
                "Price service allows {} concurrent fetches; {} advertises {}",
                config.max_concurrent,
                provider.id(),
                advertised.max_concurrency
            );
        }

        Self {
            provider,
            store,
            fast_cache: Arc::new(FastCache::new(config.fast_cache.clone())),
            locks: Arc::new(FetchLocks::new()),
            workers: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            config,
        }
    }

    pub fn config(&self) -> &PriceServiceConfig {
        &self.config
    }

    pub fn fast_cache(&self) -> &FastCache {
        &self.fast_cache
    }

    /// Resolve one ticker with a worker slot and the per-ticker timeout.
    ///
    /// The timeout starts once the slot is held. Timing out drops the
    /// in-flight work, which releases the ticker's fetch lock.
    pub async fn resolve(&self, ticker: &Ticker, range: DateRange) -> Result<Resolution, FetchError> {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|_| FetchError::Aborted {
                ticker: ticker.clone(),
                message: "worker pool closed".to_string(),
            })?;

        let work = AssertUnwindSafe(self.resolve_locked(ticker, range)).catch_unwind();

        match tokio::time::timeout(self.config.ticker_timeout, work).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(panic)) => {
                error!("Resolution of {} panicked", ticker);
                Err(FetchError::Aborted {
                    ticker: ticker.clone(),
                    message: panic_message(panic.as_ref()),
                })
            }
            Err(_) => Err(FetchError::Timeout {
                ticker: ticker.clone(),
                after: self.config.ticker_timeout,
            }),
        }
    }

    /// Cache check, fetch and write-back as one unit for `ticker`.
    async fn resolve_locked(
        &self,
        ticker: &Ticker,
        range: DateRange,
    ) -> Result<Resolution, FetchError> {
        let _guard = self.locks.acquire(ticker).await;

        let (entry, source, persisted) = match self.cached_entry(ticker, range.end).await {
            Some((entry, source)) => (entry, source, true),
            None => {
                let (entry, persisted) = self.fetch_entry(ticker).await?;
                (entry, ResolutionSource::Provider, persisted)
            }
        };

        // Checked against the bounds of whatever entry was resolved, so a
        // refetch that moved first_date earlier is honoured
        if range.start < entry.first_date() {
            return Err(FetchError::CacheDateRange {
                ticker: ticker.clone(),
                requested_start: range.start,
                first_available: entry.first_date(),
            });
        }

        Ok(Resolution {
            series: entry.series().slice(range.start, range.end),
            source,
            persisted,
        })
    }

    /// An entry that reaches `end`, from the fast cache or the store.
    ///
    /// `None` means the caller must fetch: no entry, an entry that ends
    /// before `end`, or a store read failure.
    async fn cached_entry(
        &self,
        ticker: &Ticker,
        end: NaiveDate,
    ) -> Option<(CacheEntry, ResolutionSource)> {
        if let Some((entry, _inserted_at)) = self.fast_cache.get(ticker) {
            if entry.covers_end(end) {
                debug!("Fast cache hit for {}", ticker);
                return Some((entry, ResolutionSource::FastCache));
            }
            debug!(
                "Fast cache entry for {} ends {}, before requested {}",
                ticker,
                entry.last_date(),
                end
            );
        }

        match self.store.get(ticker).await {
            Ok(Some(entry)) if entry.covers_end(end) => {
                debug!("Cache hit for {}", ticker);
                self.fast_cache.put(entry.clone());
                Some((entry, ResolutionSource::Store))
            }
            Ok(Some(entry)) => {
                info!(
                    "Cache stale for {}: last date {} is before requested end {}, refetching",
                    ticker,
                    entry.last_date(),
                    end
                );
                None
            }
            Ok(None) => {
                info!("Cache miss for {}, fetching full history", ticker);
                None
            }
            Err(e) => {
                warn!("{}. Treating as a cache miss", e);
                None
            }
        }
    }

    /// Fetch full history and overwrite both tiers.
    ///
    /// Returns the new entry and whether it was persisted. Nothing is written
    /// when the provider fails.
    async fn fetch_entry(&self, ticker: &Ticker) -> Result<(CacheEntry, bool), FetchError> {
        let series = self.provider.fetch_full_history(ticker).await?;

        if series.ticker() != ticker {
            return Err(MarketDataError::InvalidSeries {
                ticker: ticker.to_string(),
                reason: format!("{} returned a series for {}", self.provider.id(), series.ticker()),
            }
            .into());
        }

        let entry = CacheEntry::new(series, Utc::now()).ok_or_else(|| {
            FetchError::from(MarketDataError::EmptyResult {
                provider: self.provider.id().to_string(),
                ticker: ticker.to_string(),
            })
        })?;

        let persisted = match self.store.put(&entry).await {
            Ok(()) => true,
            Err(e) => {
                warn!("{}. Serving the fetched series without durability", e);
                false
            }
        };
        self.fast_cache.put(entry.clone());

        Ok((entry, persisted))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[async_trait]
impl PriceServiceTrait for PriceService {
    async fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, PriceError> {
        let range = DateRange::new(start, end)?;
        let ticker = Ticker::parse(ticker).map_err(FetchError::from)?;

        let resolution = self.resolve(&ticker, range).await.map_err(|e| {
            warn!("Failed to resolve {}: {}", ticker, e);
            e
        })?;
        Ok(resolution.series)
    }

    async fn fetch_prices_batch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BatchFetchResult, PriceError> {
        let range = DateRange::new(start, end)?;
        if tickers.is_empty() {
            return Err(PriceError::EmptyRequest);
        }

        let mut result = BatchFetchResult::default();
        let mut unique = BTreeSet::new();
        for raw in tickers {
            match Ticker::parse(raw) {
                Ok(ticker) => {
                    unique.insert(ticker);
                }
                Err(e) => {
                    warn!("Skipping ticker {:?}: {}", raw, e);
                    result.failed.insert(raw.trim().to_string(), e.into());
                }
            }
        }

        debug!(
            "Resolving {} tickers for {} to {} with {} workers",
            unique.len(),
            start,
            end,
            self.config.max_concurrent
        );

        let deadline = Instant::now() + self.config.batch_timeout;
        let mut pending = unique.clone();
        let mut tasks = JoinSet::new();
        for ticker in unique {
            let service = self.clone();
            tasks.spawn(async move {
                let outcome = service.resolve(&ticker, range).await;
                (ticker, outcome)
            });
        }

        let mut deadline_hit = false;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((ticker, outcome)))) => {
                    pending.remove(&ticker);
                    match outcome {
                        Ok(resolution) => {
                            if !resolution.persisted {
                                result.unpersisted.insert(ticker.clone());
                            }
                            result.series.insert(ticker, resolution.series);
                        }
                        Err(e) => {
                            warn!("Failed to resolve {}: {}", ticker, e);
                            result.failed.insert(ticker.to_string(), e);
                        }
                    }
                }
                Ok(Some(Err(join_error))) => {
                    error!("Price resolution task ended abnormally: {}", join_error);
                }
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    warn!(
                        "Batch timeout after {:?} with {} tickers unresolved",
                        self.config.batch_timeout,
                        pending.len()
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        for ticker in pending {
            let e = if deadline_hit {
                FetchError::BatchDeadline {
                    ticker: ticker.clone(),
                }
            } else {
                FetchError::Aborted {
                    ticker: ticker.clone(),
                    message: "task ended without a result".to_string(),
                }
            };
            result.failed.insert(ticker.to_string(), e);
        }

        if result.series.is_empty() {
            error!(
                "All {} requested tickers failed: {}",
                result.failed.len(),
                result.failed_tickers().join(", ")
            );
            return Err(PriceError::AllTickersFailed {
                failed: result.failed,
            });
        }

        info!(
            "Resolved {} of {} tickers ({} failed)",
            result.series.len(),
            result.series.len() + result.failed.len(),
            result.failed.len()
        );

        Ok(result)
    }

    async fn cache_info(&self) -> Result<Vec<CacheInfo>, StorageError> {
        self.store.list().await
    }

    async fn invalidate(&self, ticker: &Ticker) -> Result<bool, StorageError> {
        let _guard = self.locks.acquire(ticker).await;
        self.fast_cache.remove(ticker);
        let existed = self.store.delete(ticker).await?;
        info!("Invalidated cache for {} (persisted entry: {})", ticker, existed);
        Ok(existed)
    }

    async fn clear_cache(&self) -> Result<usize, StorageError> {
        self.fast_cache.clear();
        let removed = self.store.clear().await?;
        info!("Cleared price cache ({} persisted entries)", removed);
        Ok(removed)
    }
}
