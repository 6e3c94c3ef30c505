use async_trait::async_trait;
use log::{debug, warn};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;

use pricecache_core::{CacheEntry, CacheInfo, PriceStore, StorageError};
use pricecache_market_data::Ticker;

use crate::record::CacheRecord;

const ENTRY_EXTENSION: &str = "json";
const TEMP_PREFIX: &str = ".pending-";
const TEMP_SUFFIX: &str = ".partial";

/// Persistent store keeping one JSON file per ticker in a directory.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers only ever see whole records. A crash before
/// the rename leaves a `.partial` file behind; it is never read as an entry
/// and is swept by [`clear`](PriceStore::clear).
#[derive(Debug, Clone)]
pub struct FilePriceStore {
    dir: Arc<PathBuf>,
}

impl FilePriceStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            StorageError::Io(format!(
                "Failed to create cache directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir: Arc::new(dir) })
    }

    pub fn dir(&self) -> &Path {
        self.dir.as_path()
    }

    /// Path of the record for `ticker`.
    ///
    /// `:` is not portable in file names. Tickers never contain `_`, so
    /// `:` maps to it without collisions.
    pub fn entry_path(&self, ticker: &Ticker) -> PathBuf {
        entry_path(&self.dir, ticker)
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StorageError> + Send + 'static,
    {
        let dir = self.dir.clone();
        task::spawn_blocking(move || op(dir.as_path()))
            .await
            .map_err(|e| StorageError::Io(format!("Cache storage task failed: {}", e)))?
    }
}

fn entry_path(dir: &Path, ticker: &Ticker) -> PathBuf {
    let stem = ticker.as_str().replace(':', "_");
    dir.join(format!("{}.{}", stem, ENTRY_EXTENSION))
}

fn is_entry_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION)
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX))
}

fn read_record(path: &Path, ticker_hint: &str) -> Result<Option<CacheRecord>, StorageError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::ReadFailed {
                ticker: ticker_hint.to_string(),
                message: e.to_string(),
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StorageError::Corrupt {
            ticker: ticker_hint.to_string(),
            message: e.to_string(),
        })
}

fn read_entry(dir: &Path, ticker: &Ticker) -> Result<Option<CacheEntry>, StorageError> {
    let Some(record) = read_record(&entry_path(dir, ticker), ticker.as_str())? else {
        return Ok(None);
    };

    if record.ticker != *ticker {
        return Err(StorageError::Corrupt {
            ticker: ticker.to_string(),
            message: format!("file holds a record for {}", record.ticker),
        });
    }

    record
        .into_entry()
        .map(Some)
        .map_err(|message| StorageError::Corrupt {
            ticker: ticker.to_string(),
            message,
        })
}

fn write_entry(dir: &Path, entry: &CacheEntry) -> Result<(), StorageError> {
    let ticker = entry.ticker().to_string();
    let write_failed = |message: String| StorageError::WriteFailed {
        ticker: ticker.clone(),
        message,
    };

    let json = serde_json::to_vec(&CacheRecord::from(entry))
        .map_err(|e| write_failed(format!("serialization failed: {}", e)))?;

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| write_failed(format!("could not create temp file: {}", e)))?;
    temp.write_all(&json)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| write_failed(format!("could not write temp file: {}", e)))?;

    let target = entry_path(dir, entry.ticker());
    match temp.persist(&target) {
        Ok(_) => Ok(()),
        // Some platforms refuse to rename over an existing file
        Err(e) if target.exists() => {
            debug!(
                "Rename over {} failed ({}), removing old entry first",
                target.display(),
                e.error
            );
            fs::remove_file(&target)
                .map_err(|e| write_failed(format!("could not remove old entry: {}", e)))?;
            e.file
                .persist(&target)
                .map(|_| ())
                .map_err(|e| write_failed(format!("could not rename temp file: {}", e.error)))
        }
        Err(e) => Err(write_failed(format!("could not rename temp file: {}", e.error))),
    }
}

fn remove_entry(dir: &Path, ticker: &Ticker) -> Result<bool, StorageError> {
    match fs::remove_file(entry_path(dir, ticker)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::Io(format!(
            "Failed to remove cache entry for {}: {}",
            ticker, e
        ))),
    }
}

fn dir_files(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        StorageError::Io(format!(
            "Failed to read cache directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    Ok(entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect())
}

fn clear_dir(dir: &Path) -> Result<usize, StorageError> {
    let mut removed = 0;
    for path in dir_files(dir)? {
        if is_entry_file(&path) {
            fs::remove_file(&path).map_err(|e| {
                StorageError::Io(format!("Failed to remove {}: {}", path.display(), e))
            })?;
            removed += 1;
        } else if is_temp_file(&path) {
            // Leftover from an interrupted write
            if let Err(e) = fs::remove_file(&path) {
                warn!("Could not remove stale temp file {}: {}", path.display(), e);
            }
        }
    }
    Ok(removed)
}

fn list_dir(dir: &Path) -> Result<Vec<CacheInfo>, StorageError> {
    let mut infos = Vec::new();
    for path in dir_files(dir)?.into_iter().filter(|p| is_entry_file(p)) {
        let hint = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();

        match read_record(&path, &hint) {
            Ok(Some(record)) => infos.push(CacheInfo {
                ticker: record.ticker,
                first_date: record.first_date,
                last_date: record.last_date,
                fetched_at: record.fetched_at,
            }),
            Ok(None) => {}
            Err(e) => warn!("Skipping unreadable cache file {}: {}", path.display(), e),
        }
    }
    infos.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    Ok(infos)
}

#[async_trait]
impl PriceStore for FilePriceStore {
    async fn get(&self, ticker: &Ticker) -> Result<Option<CacheEntry>, StorageError> {
        let ticker = ticker.clone();
        self.run(move |dir| read_entry(dir, &ticker)).await
    }

    async fn put(&self, entry: &CacheEntry) -> Result<(), StorageError> {
        let target = self.entry_path(entry.ticker());
        let entry = entry.clone();
        self.run(move |dir| write_entry(dir, &entry)).await?;
        debug!("Persisted cache entry to {}", target.display());
        Ok(())
    }

    async fn delete(&self, ticker: &Ticker) -> Result<bool, StorageError> {
        let ticker = ticker.clone();
        self.run(move |dir| remove_entry(dir, &ticker)).await
    }

    async fn clear(&self) -> Result<usize, StorageError> {
        self.run(clear_dir).await
    }

    async fn list(&self) -> Result<Vec<CacheInfo>, StorageError> {
        self.run(list_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use pricecache_market_data::{DailyBar, PriceSeries};
    use tempfile::TempDir;

    fn t(s: &str) -> Ticker {
        Ticker::parse(s).unwrap()
    }

    fn bar(date: &str, close: f64) -> DailyBar {
        DailyBar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            adj_close: close,
            volume: 1_000,
            dividend_amount: 0.0,
            split_coefficient: 1.0,
        }
    }

    fn entry(ticker: &str, dates: &[&str]) -> CacheEntry {
        let bars = dates
            .iter()
            .enumerate()
            .map(|(i, date)| bar(date, 100.0 + i as f64))
            .collect();
        let series = PriceSeries::new(t(ticker), bars).unwrap();
        CacheEntry::new(series, Utc.with_ymd_and_hms(2024, 7, 1, 9, 30, 0).unwrap()).unwrap()
    }

    fn store() -> (TempDir, FilePriceStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePriceStore::new(dir.path()).unwrap();
        (dir, store)
    }

    fn temp_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter(|e| is_temp_file(&e.as_ref().unwrap().path()))
            .count()
    }

    #[tokio::test]
    async fn test_missing_entry_is_none() {
        let (_dir, store) = store();
        assert_eq!(store.get(&t("AAPL")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_then_get_restores_entry() {
        let (dir, store) = store();
        let original = entry("AAPL", &["2024-01-02", "2024-01-03", "2024-01-04"]);

        store.put(&original).await.unwrap();

        assert!(dir.path().join("AAPL.json").is_file());
        let loaded = store.get(&t("aapl")).await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert_eq!(loaded.fetched_at(), original.fetched_at());
        assert_eq!(temp_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_put_replaces_whole_record() {
        let (_dir, store) = store();
        store
            .put(&entry("AAPL", &["2024-01-02", "2024-01-03", "2024-01-04"]))
            .await
            .unwrap();

        let replacement = entry("AAPL", &["2024-02-01", "2024-02-02"]);
        store.put(&replacement).await.unwrap();

        let loaded = store.get(&t("AAPL")).await.unwrap().unwrap();
        assert_eq!(loaded.series().len(), 2);
        assert_eq!(loaded.first_date(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[tokio::test]
    async fn test_interrupted_write_leaves_previous_entry_intact() {
        let (dir, store) = store();
        let original = entry("AAPL", &["2024-01-02", "2024-01-03"]);
        store.put(&original).await.unwrap();

        // Crash after writing half of the next record, before the rename
        let next = serde_json::to_vec(&CacheRecord::from(&entry(
            "AAPL",
            &["2024-01-02", "2024-01-03", "2024-01-04"],
        )))
        .unwrap();
        let stray = dir.path().join(format!("{}crash{}", TEMP_PREFIX, TEMP_SUFFIX));
        fs::write(&stray, &next[..next.len() / 2]).unwrap();

        assert_eq!(store.get(&t("AAPL")).await.unwrap(), Some(original));
        assert_eq!(store.list().await.unwrap().len(), 1);

        // Clearing sweeps the leftover but only counts real entries
        assert_eq!(store.clear().await.unwrap(), 1);
        assert!(!stray.exists());
    }

    #[tokio::test]
    async fn test_truncated_entry_is_corrupt() {
        let (dir, store) = store();
        fs::write(dir.path().join("AAPL.json"), b"{\"version\":1,\"tick").unwrap();

        let err = store.get(&t("AAPL")).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { ref ticker, .. } if ticker == "AAPL"));
    }

    #[tokio::test]
    async fn test_unreadable_and_unwritable_paths_are_distinguished() {
        let (dir, store) = store();
        // A directory squatting on the entry path can be neither read nor replaced
        fs::create_dir(dir.path().join("AAPL.json")).unwrap();

        let err = store.get(&t("AAPL")).await.unwrap_err();
        assert!(matches!(err, StorageError::ReadFailed { ref ticker, .. } if ticker == "AAPL"));

        let err = store
            .put(&entry("AAPL", &["2024-01-02"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::WriteFailed { ref ticker, .. } if ticker == "AAPL"));
        assert_eq!(temp_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_prices_are_restored_bit_for_bit() {
        let (_dir, store) = store();
        let awkward = [
            0.1 + 0.2,
            1.0 / 3.0,
            2f64.sqrt() * 123.456,
            f64::from_bits(0x4093_4A45_6D5C_FAAD),
            9.876_543_210_123e300,
            5e-324,
        ];
        let bars = awkward
            .iter()
            .enumerate()
            .map(|(i, &price)| DailyBar {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap() + chrono::Days::new(i as u64),
                open: price,
                high: price * 1.01,
                low: price / 3.0,
                close: price,
                adj_close: price * 0.987_654_321,
                volume: 1,
                dividend_amount: price / 7.0,
                split_coefficient: 1.0,
            })
            .collect();
        let series = PriceSeries::new(t("AAPL"), bars).unwrap();
        let original =
            CacheEntry::new(series, Utc.with_ymd_and_hms(2024, 7, 1, 9, 30, 0).unwrap()).unwrap();

        store.put(&original).await.unwrap();
        let loaded = store.get(&t("AAPL")).await.unwrap().unwrap();

        let bits = |entry: &CacheEntry| -> Vec<[u64; 6]> {
            entry
                .series()
                .bars()
                .iter()
                .map(|b| {
                    [b.open, b.high, b.low, b.close, b.adj_close, b.dividend_amount]
                        .map(f64::to_bits)
                })
                .collect()
        };
        assert_eq!(bits(&loaded), bits(&original));
    }

    #[tokio::test]
    async fn test_record_for_another_ticker_is_corrupt() {
        let (dir, store) = store();
        store
            .put(&entry("MSFT", &["2024-01-02", "2024-01-03"]))
            .await
            .unwrap();
        fs::copy(dir.path().join("MSFT.json"), dir.path().join("AAPL.json")).unwrap();

        let err = store.get(&t("AAPL")).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let (_dir, store) = store();
        store
            .put(&entry("AAPL", &["2024-01-02"]))
            .await
            .unwrap();

        assert!(store.delete(&t("AAPL")).await.unwrap());
        assert!(!store.delete(&t("AAPL")).await.unwrap());
        assert_eq!(store.get(&t("AAPL")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_skips_foreign_files() {
        let (dir, store) = store();
        store
            .put(&entry("MSFT", &["2023-06-01", "2024-01-02"]))
            .await
            .unwrap();
        store
            .put(&entry("AAPL", &["2020-01-02", "2024-01-02"]))
            .await
            .unwrap();
        fs::write(dir.path().join("notes.txt"), "not a cache file").unwrap();
        fs::write(dir.path().join("BROKEN.json"), "[]").unwrap();

        let infos = store.list().await.unwrap();
        let tickers: Vec<&str> = infos.iter().map(|i| i.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(infos[0].first_date, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
    }

    #[tokio::test]
    async fn test_clear_counts_entries() {
        let (_dir, store) = store();
        assert_eq!(store.clear().await.unwrap(), 0);

        for ticker in ["AAPL", "MSFT", "SPY"] {
            store.put(&entry(ticker, &["2024-01-02"])).await.unwrap();
        }

        assert_eq!(store.clear().await.unwrap(), 3);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_new_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FilePriceStore::new(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested.as_path());
    }

    #[tokio::test]
    async fn test_exchange_prefixed_ticker_gets_portable_file_name() {
        let (dir, store) = store();
        let original = entry("LSE:VOD", &["2024-01-02"]);
        store.put(&original).await.unwrap();

        assert!(dir.path().join("LSE_VOD.json").is_file());
        assert_eq!(store.get(&t("LSE:VOD")).await.unwrap(), Some(original));
    }
}
