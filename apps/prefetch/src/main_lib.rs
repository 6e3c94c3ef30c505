use anyhow::Context;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pricecache_core::{BatchFetchResult, PriceField, PriceService};
use pricecache_market_data::{AlphaVantageProvider, RateLimiter};
use pricecache_storage_fs::FilePriceStore;

use crate::config::Config;

pub fn init_tracing() {
    let log_format = std::env::var("PC_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_service(config: &Config) -> anyhow::Result<PriceService> {
    let store = FilePriceStore::new(&config.cache_dir).with_context(|| {
        format!(
            "Failed to open price cache at {}",
            config.cache_dir.display()
        )
    })?;
    tracing::info!("Price cache directory in use: {}", store.dir().display());

    let mut provider =
        AlphaVantageProvider::new(config.api_key.clone()).with_timeout(config.http_timeout);
    if config.requests_per_minute > 0 {
        tracing::info!(
            "Pacing provider requests to {} per minute",
            config.requests_per_minute
        );
        provider = provider.with_rate_limiter(RateLimiter::new(config.requests_per_minute, 1));
    }

    Ok(PriceService::new(
        Arc::new(provider),
        Arc::new(store),
        config.service.clone(),
    ))
}

/// One line per ticker: resolved ones first, then failures. When several
/// tickers resolved, a last line counts the dates on which all of them traded.
pub fn render_report(result: &BatchFetchResult) -> String {
    let mut out = String::new();

    for (ticker, series) in &result.series {
        let span = match (series.first_date(), series.last_date()) {
            (Some(first), Some(last)) => format!("{} .. {}", first, last),
            _ => "no trading days in range".to_string(),
        };
        let note = if result.unpersisted.contains(ticker) {
            " (not persisted)"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "{:<10} ok      {:>6} bars  {}{}",
            ticker.as_str(),
            series.len(),
            span,
            note
        );
    }

    for (ticker, error) in &result.failed {
        let retry = if error.is_retryable() { "retryable" } else { "permanent" };
        let _ = writeln!(
            out,
            "{:<10} failed  {:?} ({}): {}",
            ticker,
            error.kind(),
            retry,
            error
        );
    }

    if result.series.len() > 1 {
        let aligned = result.table(PriceField::AdjClose).complete_rows();
        let _ = writeln!(
            out,
            "aligned    {} dates common to all {} tickers",
            aligned.dates.len(),
            aligned.tickers.len()
        );
    }

    out
}
