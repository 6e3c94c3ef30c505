//! On-disk record format.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pricecache_core::CacheEntry;
use pricecache_market_data::{DailyBar, PriceSeries, Ticker};

/// Bumped when the record layout changes incompatibly.
pub const RECORD_VERSION: u32 = 1;

/// One ticker's cache file.
///
/// The bounds are stored alongside the bars so that listing the cache does
/// not depend on the bars, and are checked against the bars on load.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub version: u32,
    pub ticker: Ticker,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub fetched_at: DateTime<Utc>,
    pub bars: Vec<DailyBar>,
}

impl From<&CacheEntry> for CacheRecord {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            version: RECORD_VERSION,
            ticker: entry.ticker().clone(),
            first_date: entry.first_date(),
            last_date: entry.last_date(),
            fetched_at: entry.fetched_at(),
            bars: entry.series().bars().to_vec(),
        }
    }
}

impl CacheRecord {
    /// Rebuild the entry, rejecting records whose metadata disagrees with
    /// their bars.
    pub fn into_entry(self) -> Result<CacheEntry, String> {
        if self.version != RECORD_VERSION {
            return Err(format!(
                "unsupported record version {} (expected {})",
                self.version, RECORD_VERSION
            ));
        }

        let series = PriceSeries::new(self.ticker, self.bars).map_err(|e| e.to_string())?;
        let entry = CacheEntry::new(series, self.fetched_at)
            .ok_or_else(|| "record has no bars".to_string())?;

        if entry.first_date() != self.first_date || entry.last_date() != self.last_date {
            return Err(format!(
                "stored bounds {}..{} do not match bars {}..{}",
                self.first_date,
                self.last_date,
                entry.first_date(),
                entry.last_date()
            ));
        }

        Ok(entry)
    }
}
