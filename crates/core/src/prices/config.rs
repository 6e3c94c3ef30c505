//! Engine settings.

use std::time::Duration;

use super::constants::{DEFAULT_BATCH_TIMEOUT, DEFAULT_MAX_CONCURRENT, DEFAULT_TICKER_TIMEOUT};
use super::fast_cache::FastCacheConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceServiceConfig {
    /// Tickers resolved at once. Shared by every request on one service.
    pub max_concurrent: usize,
    /// Per-ticker bound, starting once a worker slot is held.
    pub ticker_timeout: Duration,
    /// Whole-batch bound, including time queued for a worker slot.
    pub batch_timeout: Duration,
    pub fast_cache: FastCacheConfig,
}

impl Default for PriceServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            ticker_timeout: DEFAULT_TICKER_TIMEOUT,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
            fast_cache: FastCacheConfig::default(),
        }
    }
}
