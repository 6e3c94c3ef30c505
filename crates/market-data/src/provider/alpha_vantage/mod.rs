//! Alpha Vantage full-history provider.
//!
//! Uses the TIME_SERIES_DAILY_ADJUSTED endpoint with `outputsize=full`, which
//! returns every trading day since listing in one response.
//!
//! Response classification is by shape, not only by HTTP status:
//! - `"Error Message"` means the symbol is unknown
//! - `"Note"` / `"Information"` is a quota or frequency notice
//! - `"Time Series (Daily)"` holds the rows
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute.

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::{DailyBar, PriceSeries, Ticker};
use crate::provider::{MarketDataProvider, RateLimit};
use crate::rate_limiter::RateLimiter;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";
const FUNCTION: &str = "TIME_SERIES_DAILY_ADJUSTED";

/// Default HTTP timeout for a single request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Alpha Vantage market data provider.
///
/// Holds one shared HTTP client. Cloning the client is cheap, but a provider
/// instance is meant to live for the whole process behind an `Arc`.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
    limiter: RateLimiter,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// TIME_SERIES_DAILY_ADJUSTED response
#[derive(Debug, Deserialize)]
struct DailyAdjustedResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyAdjustedRow>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// Every field is optional so a missing value rejects the series with a
/// precise reason instead of failing the whole body parse.
#[derive(Debug, Deserialize)]
struct DailyAdjustedRow {
    #[serde(rename = "1. open")]
    open: Option<String>,
    #[serde(rename = "2. high")]
    high: Option<String>,
    #[serde(rename = "3. low")]
    low: Option<String>,
    #[serde(rename = "4. close")]
    close: Option<String>,
    #[serde(rename = "5. adjusted close")]
    adjusted_close: Option<String>,
    #[serde(rename = "6. volume")]
    volume: Option<String>,
    #[serde(rename = "7. dividend amount")]
    dividend_amount: Option<String>,
    #[serde(rename = "8. split coefficient")]
    split_coefficient: Option<String>,
}

impl AlphaVantageProvider {
    /// Create a provider with the default timeout and no client-side pacing.
    pub fn new(api_key: String) -> Self {
        Self {
            client: Self::build_client(DEFAULT_HTTP_TIMEOUT),
            api_key,
            base_url: BASE_URL.to_string(),
            limiter: RateLimiter::unlimited(),
        }
    }

    /// Replace the HTTP client with one using `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = Self::build_client(timeout);
        self
    }

    /// Point the provider at a different endpoint (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Pace outgoing requests through `limiter`.
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    fn build_client(timeout: Duration) -> Client {
        Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new())
    }

    /// Issue the request and return the status with the raw body.
    async fn fetch(&self, ticker: &Ticker) -> Result<(StatusCode, String), MarketDataError> {
        let params = [
            ("function", FUNCTION),
            ("symbol", ticker.as_str()),
            ("outputsize", "full"),
            ("apikey", self.api_key.as_str()),
        ];

        let url = reqwest::Url::parse_with_params(&self.base_url, &params).map_err(|e| {
            MarketDataError::Transport {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to build URL: {}", e),
            }
        })?;

        debug!("Alpha Vantage request: {}", self.masked(url.as_str()));

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::Transport {
                    provider: PROVIDER_ID.to_string(),
                    // reqwest includes the URL in its message
                    message: self.masked(&e.to_string()),
                }
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::Transport {
                    provider: PROVIDER_ID.to_string(),
                    message: self.masked(&e.to_string()),
                }
            }
        })?;

        Ok((status, body))
    }

    fn masked(&self, text: &str) -> String {
        if self.api_key.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.api_key, "***")
        }
    }

    /// Classify a raw response into a series or a typed error.
    fn parse_response(
        ticker: &Ticker,
        status: StatusCode,
        body: &str,
    ) -> Result<PriceSeries, MarketDataError> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let response: DailyAdjustedResponse = match serde_json::from_str(body) {
            Ok(response) => response,
            Err(e) => {
                let message = if status.is_success() {
                    format!("Failed to parse response: {}", e)
                } else {
                    format!("HTTP {}", status)
                };
                return Err(MarketDataError::Transport {
                    provider: PROVIDER_ID.to_string(),
                    message,
                });
            }
        };

        Self::check_api_error(ticker, &response)?;

        if !status.is_success() {
            return Err(MarketDataError::Transport {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let rows = match response.time_series {
            Some(rows) if !rows.is_empty() => rows,
            _ => {
                return Err(MarketDataError::EmptyResult {
                    provider: PROVIDER_ID.to_string(),
                    ticker: ticker.to_string(),
                })
            }
        };

        let bars = rows
            .into_iter()
            .map(|(date_str, row)| Self::parse_row(ticker, &date_str, &row))
            .collect::<Result<Vec<_>, _>>()?;

        PriceSeries::from_unordered(ticker.clone(), bars)
    }

    /// Check for API-level errors in the response.
    fn check_api_error(
        ticker: &Ticker,
        response: &DailyAdjustedResponse,
    ) -> Result<(), MarketDataError> {
        if let Some(ref msg) = response.error_message {
            return Err(MarketDataError::InvalidTicker {
                ticker: ticker.to_string(),
                message: msg.clone(),
            });
        }

        // Both keys carry quota notices; "Information" is used by newer responses
        if let Some(msg) = response.note.as_ref().or(response.information.as_ref()) {
            warn!("Alpha Vantage notice for {}: {}", ticker, msg);
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
                message: msg.clone(),
            });
        }

        Ok(())
    }

    fn parse_row(
        ticker: &Ticker,
        date_str: &str,
        row: &DailyAdjustedRow,
    ) -> Result<DailyBar, MarketDataError> {
        let date = Self::parse_date(date_str).ok_or_else(|| {
            MarketDataError::invalid_series(ticker.as_str(), format!("bad date '{}'", date_str))
        })?;

        let number = |value: &Option<String>, name: &str| -> Result<f64, MarketDataError> {
            value
                .as_deref()
                .and_then(Self::parse_f64)
                .ok_or_else(|| {
                    MarketDataError::invalid_series(
                        ticker.as_str(),
                        format!("missing or unparseable {} on {}", name, date_str),
                    )
                })
        };

        let volume = row
            .volume
            .as_deref()
            .and_then(Self::parse_volume)
            .ok_or_else(|| {
                MarketDataError::invalid_series(
                    ticker.as_str(),
                    format!("missing or unparseable volume on {}", date_str),
                )
            })?;

        Ok(DailyBar {
            date,
            open: number(&row.open, "open")?,
            high: number(&row.high, "high")?,
            low: number(&row.low, "low")?,
            close: number(&row.close, "close")?,
            adj_close: number(&row.adjusted_close, "adjusted close")?,
            volume,
            dividend_amount: number(&row.dividend_amount, "dividend amount")?,
            split_coefficient: number(&row.split_coefficient, "split coefficient")?,
        })
    }

    /// Parse a date string in YYYY-MM-DD format.
    fn parse_date(date_str: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()
    }

    /// Parse a numeric field. Non-finite values pass through and are rejected
    /// by series validation.
    fn parse_f64(s: &str) -> Option<f64> {
        s.trim().parse::<f64>().ok()
    }

    /// Volumes are integers, but some symbols report them with a ".0" suffix.
    fn parse_volume(s: &str) -> Option<u64> {
        let s = s.trim();
        s.parse::<u64>().ok().or_else(|| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
                .map(|v| v as u64)
        })
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 5, // Free tier
            max_concurrency: 1,
        }
    }

    async fn fetch_full_history(&self, ticker: &Ticker) -> Result<PriceSeries, MarketDataError> {
        self.limiter.acquire().await;

        let (status, body) = self.fetch(ticker).await?;
        let series = Self::parse_response(ticker, status, &body)?;

        info!(
            "Alpha Vantage: fetched {} daily bars for {} ({} to {})",
            series.len(),
            ticker,
            series.first_date().map(|d| d.to_string()).unwrap_or_default(),
            series.last_date().map(|d| d.to_string()).unwrap_or_default(),
        );

        Ok(series)
    }
}
