//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Rate limit description
//! - The Alpha Vantage full-history provider

mod capabilities;
mod traits;

pub mod alpha_vantage;

// Re-exports
pub use capabilities::RateLimit;
pub use traits::MarketDataProvider;
