use anyhow::{anyhow, bail, Context};
use chrono::{Local, Months, NaiveDate};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use pricecache_core::prices::constants::{
    DEFAULT_BATCH_TIMEOUT, DEFAULT_FAST_CACHE_CAPACITY, DEFAULT_FAST_CACHE_TTL,
    DEFAULT_MAX_CONCURRENT, DEFAULT_TICKER_TIMEOUT,
};
use pricecache_core::prices::FastCacheConfig;
use pricecache_core::PriceServiceConfig;

const DEFAULT_CACHE_DIR: &str = "./price-cache";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub cache_dir: PathBuf,
    pub http_timeout: Duration,
    /// Client-side pacing; 0 disables it.
    pub requests_per_minute: u32,
    pub service: PriceServiceConfig,
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok(), Local::now().date_naive())
    }

    /// Build from an arbitrary variable source. `today` anchors the default
    /// date range.
    pub fn from_lookup<F>(lookup: F, today: NaiveDate) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = var("PC_ALPHA_VANTAGE_API_KEY")
            .or_else(|| var("ALPHA_KEY"))
            .ok_or_else(|| anyhow!("PC_ALPHA_VANTAGE_API_KEY (or ALPHA_KEY) must be set"))?;

        let max_concurrent = positive(
            "PC_MAX_CONCURRENT",
            parse(&var, "PC_MAX_CONCURRENT", DEFAULT_MAX_CONCURRENT)?,
        )?;
        let ticker_timeout_ms = positive(
            "PC_TICKER_TIMEOUT_MS",
            parse(&var, "PC_TICKER_TIMEOUT_MS", millis(DEFAULT_TICKER_TIMEOUT))?,
        )?;
        let batch_timeout_ms = positive(
            "PC_BATCH_TIMEOUT_MS",
            parse(&var, "PC_BATCH_TIMEOUT_MS", millis(DEFAULT_BATCH_TIMEOUT))?,
        )?;
        let capacity = positive(
            "PC_FAST_CACHE_CAPACITY",
            parse(&var, "PC_FAST_CACHE_CAPACITY", DEFAULT_FAST_CACHE_CAPACITY)?,
        )?;
        let ttl_secs = positive(
            "PC_FAST_CACHE_TTL_SECS",
            parse(&var, "PC_FAST_CACHE_TTL_SECS", DEFAULT_FAST_CACHE_TTL.as_secs())?,
        )?;
        let http_timeout_secs = positive(
            "PC_HTTP_TIMEOUT_SECS",
            parse(&var, "PC_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
        )?;
        let requests_per_minute: u32 = parse(&var, "PC_PROVIDER_REQUESTS_PER_MINUTE", 0)?;

        let cache_dir = var("PC_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));

        let tickers: Vec<String> = var("PC_PREFETCH_TICKERS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if tickers.is_empty() {
            bail!("PC_PREFETCH_TICKERS must list at least one ticker");
        }

        let default_start = today.checked_sub_months(Months::new(12)).unwrap_or(today);
        let start = date(&var, "PC_PREFETCH_START", default_start)?;
        let end = date(&var, "PC_PREFETCH_END", today)?;
        if start > end {
            bail!("PC_PREFETCH_START {} is after PC_PREFETCH_END {}", start, end);
        }

        Ok(Self {
            api_key,
            cache_dir,
            http_timeout: Duration::from_secs(http_timeout_secs),
            requests_per_minute,
            service: PriceServiceConfig {
                max_concurrent,
                ticker_timeout: Duration::from_millis(ticker_timeout_ms),
                batch_timeout: Duration::from_millis(batch_timeout_ms),
                fast_cache: FastCacheConfig {
                    capacity,
                    ttl: Duration::from_secs(ttl_secs),
                },
            },
            tickers,
            start,
            end,
        })
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn parse<T, V>(var: &V, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("Invalid {} {:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

fn positive<T>(key: &str, value: T) -> anyhow::Result<T>
where
    T: PartialEq + Default,
{
    if value == T::default() {
        bail!("{} must be greater than zero", key);
    }
    Ok(value)
}

fn date<V>(var: &V, key: &str, default: NaiveDate) -> anyhow::Result<NaiveDate>
where
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .with_context(|| format!("Invalid {} {:?}, expected YYYY-MM-DD", key, raw)),
        None => Ok(default),
    }
}
