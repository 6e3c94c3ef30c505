//! Normalized ticker symbol.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::MarketDataError;

/// Characters allowed in a symbol besides ASCII letters and digits.
///
/// Covers share classes (`BRK.B`, `BF-B`), indices (`^GSPC`), FX/futures
/// suffixes (`EURUSD=X`) and exchange-qualified symbols (`TSX:RY`).
const SYMBOL_PUNCTUATION: &[char] = &['.', '-', '^', '=', ':'];

/// A trimmed, uppercase ticker symbol.
///
/// Examples: "AAPL", "BRK.B", "^GSPC"
///
/// Constructing a `Ticker` is the only place symbols are normalized, so two
/// tickers that differ only in case or surrounding whitespace compare equal
/// and share one cache entry and one fetch lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Normalize and validate a raw symbol.
    ///
    /// Returns [`MarketDataError::InvalidTicker`] when the symbol is empty or
    /// contains characters no provider accepts.
    pub fn parse(raw: &str) -> Result<Self, MarketDataError> {
        let normalized = raw.trim().to_ascii_uppercase();

        if normalized.is_empty() {
            return Err(MarketDataError::InvalidTicker {
                ticker: raw.to_string(),
                message: "ticker is empty".to_string(),
            });
        }

        if let Some(bad) = normalized
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !SYMBOL_PUNCTUATION.contains(c))
        {
            return Err(MarketDataError::InvalidTicker {
                ticker: raw.to_string(),
                message: format!("unexpected character '{}'", bad),
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Ticker {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = MarketDataError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl TryFrom<&str> for Ticker {
    type Error = MarketDataError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
