//! Per-ticker fetch locks.
//!
//! One async mutex per ticker, created on first use and kept for the life of
//! the registry. Holding a ticker's guard makes the cache check, the provider
//! call and the write-back one unit relative to other requests for that
//! ticker, so concurrent cold requests trigger a single provider call.
//!
//! The registry map itself is behind a std mutex that is held only to look up
//! or create an entry, never across an await.

use log::warn;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use pricecache_market_data::Ticker;

/// RAII guard for one ticker. Dropping it (including on timeout cancellation
/// or unwinding) releases the lock.
#[derive(Debug)]
pub struct FetchGuard {
    _guard: OwnedMutexGuard<()>,
}

#[derive(Default)]
pub struct FetchLocks {
    locks: Mutex<HashMap<Ticker, Arc<AsyncMutex<()>>>>,
}

impl FetchLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<Ticker, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| {
            warn!("Fetch lock registry mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_for(&self, ticker: &Ticker) -> Arc<AsyncMutex<()>> {
        self.registry()
            .entry(ticker.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for exclusive access to `ticker`.
    pub async fn acquire(&self, ticker: &Ticker) -> FetchGuard {
        let lock = self.lock_for(ticker);
        FetchGuard {
            _guard: lock.lock_owned().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn t(s: &str) -> Ticker {
        Ticker::parse(s).unwrap()
    }

    fn is_held(locks: &FetchLocks, ticker: &Ticker) -> bool {
        let lock = locks.lock_for(ticker);
        let held = lock.try_lock().is_err();
        held
    }

    #[tokio::test]
    async fn test_same_ticker_is_exclusive() {
        let locks = FetchLocks::new();
        let guard = locks.acquire(&t("AAPL")).await;

        assert!(is_held(&locks, &t("AAPL")));
        assert!(is_held(&locks, &t("aapl")));

        drop(guard);
        assert!(!is_held(&locks, &t("AAPL")));
    }

    #[tokio::test]
    async fn test_different_tickers_do_not_block() {
        let locks = FetchLocks::new();
        let _aapl = locks.acquire(&t("AAPL")).await;
        assert!(!is_held(&locks, &t("MSFT")));
    }

    #[tokio::test]
    async fn test_entries_are_retained_after_release() {
        let locks = FetchLocks::new();
        drop(locks.acquire(&t("AAPL")).await);
        drop(locks.acquire(&t("MSFT")).await);
        drop(locks.acquire(&t("AAPL")).await);
        assert_eq!(locks.registry().len(), 2);
    }

    #[tokio::test]
    async fn test_timed_out_waiter_does_not_hold_lock() {
        let locks = Arc::new(FetchLocks::new());
        let aapl = t("AAPL");
        let guard = locks.acquire(&aapl).await;

        // A waiter that times out must not leave the lock held
        let waiter = tokio::time::timeout(Duration::from_millis(20), locks.acquire(&aapl));
        assert!(waiter.await.is_err());

        drop(guard);
        assert!(!is_held(&locks, &aapl));
        let reacquired = tokio::time::timeout(Duration::from_secs(1), locks.acquire(&aapl)).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_serializes_critical_sections() {
        let locks = Arc::new(FetchLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&t("AAPL")).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
