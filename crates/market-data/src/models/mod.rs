//! Domain models for the market data crate.
//!
//! - [`Ticker`] - Normalized symbol identity
//! - [`PriceSeries`] - Validated daily history for one ticker
//! - [`DailyBar`] - One day of adjusted OHLCV plus dividend and split data
//! - [`PriceField`] - Selects a column of a series

mod series;
mod ticker;

pub use series::{DailyBar, PriceField, PriceSeries};
pub use ticker::Ticker;
