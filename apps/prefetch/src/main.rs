mod config;
mod main_lib;

use config::Config;
use main_lib::{build_service, init_tracing, render_report};
use pricecache_core::{PriceError, PriceServiceTrait};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();
    let service = build_service(&config)?;

    tracing::info!(
        "Prefetching {} tickers for {} .. {}",
        config.tickers.len(),
        config.start,
        config.end
    );

    match service
        .fetch_prices_batch(&config.tickers, config.start, config.end)
        .await
    {
        Ok(result) => {
            print!("{}", render_report(&result));
            if !result.is_complete() {
                tracing::warn!(
                    "{} tickers could not be prefetched: {}",
                    result.failed.len(),
                    result.failed_tickers().join(", ")
                );
            }
        }
        Err(PriceError::AllTickersFailed { failed }) => {
            for (ticker, error) in &failed {
                eprintln!("{:<10} failed  {}", ticker, error);
            }
            anyhow::bail!("All {} requested tickers failed", failed.len());
        }
        Err(e) => return Err(e.into()),
    }

    let cached = service.cache_info().await?;
    tracing::info!("Price cache now holds {} tickers", cached.len());
    Ok(())
}
