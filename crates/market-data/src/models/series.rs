//! Canonical daily price series.
//!
//! A [`PriceSeries`] is the provider-independent representation of one
//! ticker's daily history. Every constructor validates it, so a value of this
//! type always satisfies:
//! - dates are strictly increasing (no duplicates)
//! - every numeric field of every bar is finite

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Ticker;
use crate::errors::MarketDataError;

// ============================================================================
// DailyBar
// ============================================================================

/// One trading day of adjusted daily data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
    pub dividend_amount: f64,
    pub split_coefficient: f64,
}

impl DailyBar {
    /// Returns the value of a single field as `f64`.
    pub fn value(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::AdjClose => self.adj_close,
            PriceField::Volume => self.volume as f64,
            PriceField::DividendAmount => self.dividend_amount,
            PriceField::SplitCoefficient => self.split_coefficient,
        }
    }

    /// Name of the first non-finite field, if any.
    fn first_non_finite(&self) -> Option<PriceField> {
        PriceField::ALL
            .iter()
            .copied()
            .find(|field| !self.value(*field).is_finite())
    }
}

/// Selects one column of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    AdjClose,
    Volume,
    DividendAmount,
    SplitCoefficient,
}

impl PriceField {
    pub const ALL: [PriceField; 8] = [
        PriceField::Open,
        PriceField::High,
        PriceField::Low,
        PriceField::Close,
        PriceField::AdjClose,
        PriceField::Volume,
        PriceField::DividendAmount,
        PriceField::SplitCoefficient,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::AdjClose => "adjClose",
            PriceField::Volume => "volume",
            PriceField::DividendAmount => "dividendAmount",
            PriceField::SplitCoefficient => "splitCoefficient",
        }
    }
}

// ============================================================================
// PriceSeries
// ============================================================================

/// Validated, date-ordered daily history for one ticker.
///
/// A series may be empty only when it is the result of [`slice`](Self::slice);
/// providers report a history with no rows as [`MarketDataError::EmptyResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesRecord")]
pub struct PriceSeries {
    ticker: Ticker,
    bars: Vec<DailyBar>,
}

/// Unvalidated wire form, converted through [`PriceSeries::new`] on deserialize.
#[derive(Deserialize)]
struct SeriesRecord {
    ticker: Ticker,
    bars: Vec<DailyBar>,
}

impl TryFrom<SeriesRecord> for PriceSeries {
    type Error = MarketDataError;

    fn try_from(record: SeriesRecord) -> Result<Self, Self::Error> {
        PriceSeries::new(record.ticker, record.bars)
    }
}

impl PriceSeries {
    /// Build a series from bars that are already in date order.
    ///
    /// Rejects the whole series if any bar has a non-finite field or if the
    /// dates are not strictly increasing.
    pub fn new(ticker: Ticker, bars: Vec<DailyBar>) -> Result<Self, MarketDataError> {
        for (index, bar) in bars.iter().enumerate() {
            if let Some(field) = bar.first_non_finite() {
                return Err(MarketDataError::invalid_series(
                    ticker.as_str(),
                    format!("non-finite {} on {}", field.as_str(), bar.date),
                ));
            }

            if index > 0 && bars[index - 1].date >= bar.date {
                let reason = if bars[index - 1].date == bar.date {
                    format!("duplicate date {}", bar.date)
                } else {
                    format!("{} follows {}", bar.date, bars[index - 1].date)
                };
                return Err(MarketDataError::invalid_series(ticker.as_str(), reason));
            }
        }

        Ok(Self { ticker, bars })
    }

    /// Build a series from bars in arbitrary order.
    ///
    /// Providers return keyed maps with no ordering guarantee; this sorts by
    /// date before validating. Duplicate dates are still rejected.
    pub fn from_unordered(
        ticker: Ticker,
        mut bars: Vec<DailyBar>,
    ) -> Result<Self, MarketDataError> {
        bars.sort_by_key(|bar| bar.date);
        Self::new(ticker, bars)
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Earliest date in the series.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|bar| bar.date)
    }

    /// Latest date in the series.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|bar| bar.date)
    }

    /// Look up the bar for an exact date.
    pub fn get(&self, date: NaiveDate) -> Option<&DailyBar> {
        self.bars
            .binary_search_by_key(&date, |bar| bar.date)
            .ok()
            .map(|index| &self.bars[index])
    }

    /// Bars within `[start, end]`, both inclusive.
    ///
    /// Returns an empty series when the range holds no trading days or when
    /// `start > end`.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        let from = self.bars.partition_point(|bar| bar.date < start);
        let to = self.bars.partition_point(|bar| bar.date <= end);

        let bars = if from < to {
            self.bars[from..to].to_vec()
        } else {
            Vec::new()
        };

        // A contiguous sub-range keeps both invariants
        PriceSeries {
            ticker: self.ticker.clone(),
            bars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn bar(d: &str, close: f64) -> DailyBar {
        DailyBar {
            date: date(d),
            open: close,
            high: close,
            low: close,
            close,
            adj_close: close,
            volume: 1_000,
            dividend_amount: 0.0,
            split_coefficient: 1.0,
        }
    }

    fn ticker() -> Ticker {
        Ticker::parse("AAPL").unwrap()
    }

    #[test]
    fn test_new_accepts_strictly_increasing_bars() {
        let series = PriceSeries::new(
            ticker(),
            vec![bar("2024-01-02", 1.0), bar("2024-01-03", 2.0)],
        )
        .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.first_date(), Some(date("2024-01-02")));
        assert_eq!(series.last_date(), Some(date("2024-01-03")));
    }

    #[test]
    fn test_new_rejects_nan_anywhere() {
        let mut bad = bar("2024-01-03", 2.0);
        bad.adj_close = f64::NAN;

        let err = PriceSeries::new(ticker(), vec![bar("2024-01-02", 1.0), bad]).unwrap_err();
        match err {
            MarketDataError::InvalidSeries { ticker, reason } => {
                assert_eq!(ticker, "AAPL");
                assert!(reason.contains("adjClose"));
                assert!(reason.contains("2024-01-03"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_new_rejects_infinite_dividend() {
        let mut bad = bar("2024-01-02", 1.0);
        bad.dividend_amount = f64::INFINITY;
        assert!(PriceSeries::new(ticker(), vec![bad]).is_err());
    }

    #[test]
    fn test_new_rejects_duplicate_dates() {
        let err = PriceSeries::new(
            ticker(),
            vec![bar("2024-01-02", 1.0), bar("2024-01-02", 1.5)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate date 2024-01-02"));
    }

    #[test]
    fn test_new_rejects_out_of_order() {
        assert!(PriceSeries::new(
            ticker(),
            vec![bar("2024-01-03", 1.0), bar("2024-01-02", 1.5)],
        )
        .is_err());
    }

    #[test]
    fn test_from_unordered_sorts() {
        let series = PriceSeries::from_unordered(
            ticker(),
            vec![
                bar("2024-01-04", 3.0),
                bar("2024-01-02", 1.0),
                bar("2024-01-03", 2.0),
            ],
        )
        .unwrap();
        let dates: Vec<_> = series.bars().iter().map(|b| b.date).collect();
        assert_eq!(
            dates,
            vec![date("2024-01-02"), date("2024-01-03"), date("2024-01-04")]
        );
    }

    #[test]
    fn test_slice_is_inclusive_on_both_ends() {
        let series = PriceSeries::new(
            ticker(),
            vec![
                bar("2024-01-02", 1.0),
                bar("2024-01-03", 2.0),
                bar("2024-01-04", 3.0),
                bar("2024-01-05", 4.0),
            ],
        )
        .unwrap();

        let slice = series.slice(date("2024-01-03"), date("2024-01-04"));
        assert_eq!(slice.len(), 2);
        assert_eq!(slice.first_date(), Some(date("2024-01-03")));
        assert_eq!(slice.last_date(), Some(date("2024-01-04")));
        assert_eq!(slice.ticker().as_str(), "AAPL");
    }

    #[test]
    fn test_slice_between_trading_days_is_empty() {
        let series = PriceSeries::new(
            ticker(),
            vec![bar("2024-01-05", 1.0), bar("2024-01-08", 2.0)],
        )
        .unwrap();
        assert!(series.slice(date("2024-01-06"), date("2024-01-07")).is_empty());
        assert!(series.slice(date("2024-01-08"), date("2024-01-05")).is_empty());
    }

    #[test]
    fn test_get_finds_exact_date() {
        let series = PriceSeries::new(
            ticker(),
            vec![bar("2024-01-02", 1.0), bar("2024-01-03", 2.0)],
        )
        .unwrap();
        assert_eq!(series.get(date("2024-01-03")).map(|b| b.close), Some(2.0));
        assert!(series.get(date("2024-01-04")).is_none());
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{
            "ticker": "aapl",
            "bars": [
                {"date": "2024-01-03", "open": 1, "high": 1, "low": 1, "close": 1,
                 "adjClose": 1, "volume": 10, "dividendAmount": 0, "splitCoefficient": 1},
                {"date": "2024-01-02", "open": 1, "high": 1, "low": 1, "close": 1,
                 "adjClose": 1, "volume": 10, "dividendAmount": 0, "splitCoefficient": 1}
            ]
        }"#;
        assert!(serde_json::from_str::<PriceSeries>(json).is_err());
    }

    #[test]
    fn test_serialized_nan_does_not_load_back() {
        // serde_json writes non-finite floats as null, which no longer parses as f64
        let json = r#"{"ticker":"AAPL","bars":[{"date":"2024-01-02","open":null,"high":1,
            "low":1,"close":1,"adjClose":1,"volume":1,"dividendAmount":0,"splitCoefficient":1}]}"#;
        assert!(serde_json::from_str::<PriceSeries>(json).is_err());
    }
}
