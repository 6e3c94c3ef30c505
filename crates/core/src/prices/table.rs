//! Date-aligned multi-ticker price table.
//!
//! Allocators consume one matrix of prices (dates x tickers) rather than a
//! map of independent series. Tickers trade on different calendars, so rows
//! are the union of all dates and missing cells are `None`.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use pricecache_market_data::{PriceField, PriceSeries, Ticker};

#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    pub field: PriceField,
    /// Row labels, ascending.
    pub dates: Vec<NaiveDate>,
    /// Column labels, ascending.
    pub tickers: Vec<Ticker>,
    /// `values[row][column]`
    pub values: Vec<Vec<Option<f64>>>,
}

impl PriceTable {
    pub fn from_series<'a>(
        field: PriceField,
        series: impl IntoIterator<Item = &'a PriceSeries>,
    ) -> Self {
        let mut columns: Vec<&PriceSeries> = series.into_iter().collect();
        columns.sort_by(|a, b| a.ticker().cmp(b.ticker()));

        let dates: Vec<NaiveDate> = columns
            .iter()
            .flat_map(|s| s.bars().iter().map(|bar| bar.date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut values = vec![vec![None; columns.len()]; dates.len()];
        for (column, s) in columns.iter().enumerate() {
            // Both sides are sorted, so walk them together
            let mut row = 0;
            for bar in s.bars() {
                while dates[row] < bar.date {
                    row += 1;
                }
                values[row][column] = Some(bar.value(field));
            }
        }

        Self {
            field,
            dates,
            tickers: columns.iter().map(|s| s.ticker().clone()).collect(),
            values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.tickers.is_empty()
    }

    pub fn row(&self, date: NaiveDate) -> Option<&[Option<f64>]> {
        let index = self.dates.binary_search(&date).ok()?;
        Some(&self.values[index])
    }

    pub fn column(&self, ticker: &Ticker) -> Option<Vec<Option<f64>>> {
        let index = self.tickers.iter().position(|t| t == ticker)?;
        Some(self.values.iter().map(|row| row[index]).collect())
    }

    /// Keep only dates on which every ticker has a value.
    pub fn complete_rows(&self) -> PriceTable {
        let (dates, values): (Vec<NaiveDate>, Vec<Vec<Option<f64>>>) = self
            .dates
            .iter()
            .zip(&self.values)
            .filter(|(_, row)| row.iter().all(Option::is_some))
            .map(|(date, row)| (*date, row.clone()))
            .unzip();

        PriceTable {
            field: self.field,
            dates,
            tickers: self.tickers.clone(),
            values,
        }
    }
}
