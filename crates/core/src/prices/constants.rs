use std::time::Duration;

/// Tickers resolved at the same time across the whole service.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Upper bound on one ticker's resolution (lock wait, cache lookups, fetch, write).
pub const DEFAULT_TICKER_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on a whole batch, including time spent queued for a worker.
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(300);

pub const DEFAULT_FAST_CACHE_CAPACITY: usize = 32;

pub const DEFAULT_FAST_CACHE_TTL: Duration = Duration::from_secs(15 * 60);
