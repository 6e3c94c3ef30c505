use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

use pricecache_core::{
    FetchErrorKind, PriceError, PriceService, PriceServiceConfig, PriceServiceTrait, PriceStore,
};
use pricecache_market_data::{
    DailyBar, MarketDataError, MarketDataProvider, PriceSeries, RateLimit, Ticker,
};
use pricecache_storage_fs::FilePriceStore;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Serves a fixed set of histories and counts calls.
struct FixedProvider {
    histories: Vec<PriceSeries>,
    calls: AtomicUsize,
}

impl FixedProvider {
    fn new(histories: Vec<PriceSeries>) -> Arc<Self> {
        Arc::new(Self {
            histories,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for FixedProvider {
    fn id(&self) -> &'static str {
        "FIXED"
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    async fn fetch_full_history(&self, ticker: &Ticker) -> Result<PriceSeries, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.histories
            .iter()
            .find(|series| series.ticker() == ticker)
            .cloned()
            .ok_or_else(|| MarketDataError::InvalidTicker {
                ticker: ticker.to_string(),
                message: "Invalid API call".to_string(),
            })
    }
}

/// Daily bars (weekends included) from `from` to `to`.
fn history(ticker: &str, from: &str, to: &str) -> PriceSeries {
    let bars = d(from)
        .iter_days()
        .take_while(|date| *date <= d(to))
        .enumerate()
        .map(|(i, date)| DailyBar {
            date,
            open: 50.0 + i as f64,
            high: 51.0 + i as f64,
            low: 49.0 + i as f64,
            close: 50.5 + i as f64,
            adj_close: 50.5 + i as f64,
            volume: 500,
            dividend_amount: 0.0,
            split_coefficient: 1.0,
        })
        .collect();
    PriceSeries::new(Ticker::parse(ticker).unwrap(), bars).unwrap()
}

fn engine(provider: &Arc<FixedProvider>, store: &FilePriceStore) -> PriceService {
    PriceService::new(
        provider.clone(),
        Arc::new(store.clone()),
        PriceServiceConfig::default(),
    )
}

#[tokio::test]
async fn cached_history_survives_restart() {
    let dir = tempdir().unwrap();
    let provider = FixedProvider::new(vec![history("AAPL", "2020-01-01", "2024-06-30")]);
    let store = FilePriceStore::new(dir.path()).unwrap();

    let first = engine(&provider, &store)
        .fetch_prices("AAPL", d("2023-01-01"), d("2023-01-31"))
        .await
        .unwrap();
    assert_eq!(first.len(), 31);
    assert_eq!(provider.calls(), 1);

    // A new engine has an empty fast cache and must read the file
    let reopened = FilePriceStore::new(dir.path()).unwrap();
    let second = engine(&provider, &reopened)
        .fetch_prices("AAPL", d("2022-03-01"), d("2024-06-30"))
        .await
        .unwrap();
    assert_eq!(second.first_date(), Some(d("2022-03-01")));
    assert_eq!(second.last_date(), Some(d("2024-06-30")));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn corrupt_file_is_refetched_and_rewritten() {
    let dir = tempdir().unwrap();
    let provider = FixedProvider::new(vec![history("MSFT", "2021-01-01", "2024-01-31")]);
    let store = FilePriceStore::new(dir.path()).unwrap();
    std::fs::write(store.entry_path(&Ticker::parse("MSFT").unwrap()), "{ not json").unwrap();

    let series = engine(&provider, &store)
        .fetch_prices("MSFT", d("2024-01-01"), d("2024-01-31"))
        .await
        .unwrap();

    assert_eq!(series.len(), 31);
    assert_eq!(provider.calls(), 1);
    let infos = store.list().await.unwrap();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].first_date, d("2021-01-01"));
}

#[tokio::test]
async fn batch_persists_only_successful_tickers() {
    let dir = tempdir().unwrap();
    let provider = FixedProvider::new(vec![
        history("AAPL", "2020-01-01", "2024-06-30"),
        history("MSFT", "2020-01-01", "2024-06-30"),
    ]);
    let store = FilePriceStore::new(dir.path()).unwrap();
    let service = engine(&provider, &store);

    let tickers: Vec<String> = ["AAPL", "MSFT", "ZZZZ"].iter().map(|s| s.to_string()).collect();
    let result = service
        .fetch_prices_batch(&tickers, d("2024-01-01"), d("2024-03-31"))
        .await
        .unwrap();

    assert_eq!(result.series.len(), 2);
    assert!(result.unpersisted.is_empty());
    assert_eq!(result.failed["ZZZZ"].kind(), FetchErrorKind::InvalidTicker);

    let cached: Vec<String> = service
        .cache_info()
        .await
        .unwrap()
        .into_iter()
        .map(|info| info.ticker.to_string())
        .collect();
    assert_eq!(cached, vec!["AAPL", "MSFT"]);
}

#[tokio::test]
async fn range_floor_is_reported_from_persisted_bounds() {
    let dir = tempdir().unwrap();
    let provider = FixedProvider::new(vec![history("SPY", "2010-01-01", "2024-06-30")]);
    let store = FilePriceStore::new(dir.path()).unwrap();
    let service = engine(&provider, &store);

    service
        .fetch_prices("SPY", d("2020-01-01"), d("2020-12-31"))
        .await
        .unwrap();

    let err = engine(&provider, &store)
        .fetch_prices("SPY", d("2005-01-01"), d("2020-12-31"))
        .await
        .unwrap_err();

    match err {
        PriceError::Ticker(e) => {
            assert_eq!(e.kind(), FetchErrorKind::CacheDateRangeError);
            assert!(e.to_string().contains("2010-01-01"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn clear_cache_removes_files() {
    let dir = tempdir().unwrap();
    let provider = FixedProvider::new(vec![history("AAPL", "2020-01-01", "2024-06-30")]);
    let store = FilePriceStore::new(dir.path()).unwrap();
    let service = engine(&provider, &store);

    service
        .fetch_prices("AAPL", d("2024-01-01"), d("2024-01-31"))
        .await
        .unwrap();
    assert!(store.entry_path(&Ticker::parse("AAPL").unwrap()).exists());

    assert_eq!(service.clear_cache().await.unwrap(), 1);
    assert!(!store.entry_path(&Ticker::parse("AAPL").unwrap()).exists());
}
