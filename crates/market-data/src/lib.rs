//! Price Cache Market Data Crate
//!
//! This crate provides the provider side of the price cache: the canonical
//! daily series model and the clients that fetch full histories upstream.
//!
//! # Overview
//!
//! - A validated, provider-independent series model
//! - A provider trait returning complete daily history per call
//! - An Alpha Vantage implementation with response classification
//! - Optional client-side request pacing
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |   Price engine   | --> |     Ticker       |  (normalized identity)
//! +------------------+     +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |    Provider      |  (Alpha Vantage)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |   PriceSeries    |  (validated daily bars)
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Ticker`] - Trimmed, uppercase symbol
//! - [`PriceSeries`] - Strictly date-ordered, all-finite daily history
//! - [`DailyBar`] - One trading day
//! - [`MarketDataError`] - Classified provider and validation failures

pub mod errors;
pub mod models;
pub mod provider;
pub mod rate_limiter;

pub use errors::{MarketDataError, RetryClass};
pub use models::{DailyBar, PriceField, PriceSeries, Ticker};
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::{MarketDataProvider, RateLimit};
pub use rate_limiter::RateLimiter;
