//! Daily chart adapter.
//!
//! Pulls daily OHLCV bars from a Yahoo-style chart endpoint and reduces them
//! to a [`TechnicalSnapshot`] with the indicators in [`super::indicators`].
//!
//! API: `GET {base}/v8/finance/chart/{ticker}?interval=1d&range=6mo`

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use tsm_common::MarketDataConfig;

use super::indicators::snapshot_from_candles;
use super::provider::{FetchError, TechnicalSource};
use super::rate_limiter::{shared_limiter, SharedRateLimiter};
use super::{Candle, Symbol, TechnicalSnapshot};

/// Index symbols whose chart ticker differs from the F&O name.
const INDEX_TICKERS: &[(&str, &str)] = &[
    ("NIFTY", "^NSEI"),
    ("BANKNIFTY", "^NSEBANK"),
    ("FINNIFTY", "NIFTY_FIN_SERVICE.NS"),
    ("MIDCPNIFTY", "NIFTY_MID_SELECT.NS"),
];

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

/// Columns are nullable per bar (holidays, halted sessions).
#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl ChartResult {
    /// Zip the columns into candles, dropping bars with any missing value.
    fn into_candles(self) -> Vec<Candle> {
        let Some(quote) = self.indicators.quote.into_iter().next() else {
            return Vec::new();
        };

        self.timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let column = |c: &Vec<Option<f64>>| c.get(i).copied().flatten();
                Some(Candle {
                    timestamp: Utc.timestamp_opt(*ts, 0).single()?,
                    open: column(&quote.open)?,
                    high: column(&quote.high)?,
                    low: column(&quote.low)?,
                    close: column(&quote.close)?,
                    volume: column(&quote.volume)?,
                })
            })
            .collect()
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Technical snapshots from daily chart bars.
pub struct ChartAdapter {
    client: reqwest::Client,
    base_url: String,
    range: String,
    exchange_suffix: String,
    timeout: Duration,
    limiter: SharedRateLimiter,
}

impl ChartAdapter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            range: "6mo".to_string(),
            exchange_suffix: ".NS".to_string(),
            timeout: Duration::from_secs(8),
            limiter: shared_limiter("chart", 120),
        }
    }

    pub fn from_config(client: reqwest::Client, config: &MarketDataConfig) -> Self {
        Self {
            client,
            base_url: config.chart_base_url.trim_end_matches('/').to_string(),
            range: config.chart_range.clone(),
            exchange_suffix: config.exchange_suffix.clone(),
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            limiter: shared_limiter("chart", config.chart_requests_per_minute),
        }
    }

    pub fn with_limiter(mut self, limiter: SharedRateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Chart ticker for an F&O symbol.
    pub fn ticker_for(&self, symbol: &Symbol) -> String {
        INDEX_TICKERS
            .iter()
            .find(|(name, _)| *name == symbol.as_str())
            .map(|(_, ticker)| ticker.to_string())
            .unwrap_or_else(|| format!("{}{}", symbol, self.exchange_suffix))
    }

    /// Fetch daily bars, oldest first.
    pub async fn fetch_candles(&self, symbol: &Symbol) -> Result<Vec<Candle>, FetchError> {
        self.limiter.acquire().await;

        let ticker = self.ticker_for(symbol);
        let endpoint = format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            urlencoding::encode(&ticker)
        );

        let response = self
            .client
            .get(&endpoint)
            .query(&[("interval", "1d"), ("range", self.range.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status, &endpoint, self.name()));
        }

        let body: ChartResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(format!("chart for {}: {}", ticker, e)))?;

        if let Some(err) = body.chart.error {
            return Err(FetchError::NotAvailable(format!(
                "{}: {}",
                err.code.unwrap_or_else(|| "error".into()),
                err.description.unwrap_or_default()
            )));
        }

        let result = body
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| FetchError::NotAvailable(format!("no chart result for {}", ticker)))?;

        let candles = result.into_candles();
        debug!(symbol = %symbol, ticker = %ticker, bars = candles.len(), "Fetched daily bars");
        Ok(candles)
    }
}

#[async_trait]
impl TechnicalSource for ChartAdapter {
    fn name(&self) -> &'static str {
        "chart"
    }

    async fn fetch_snapshot(&self, symbol: &Symbol) -> Result<TechnicalSnapshot, FetchError> {
        let candles = self.fetch_candles(symbol).await?;
        snapshot_from_candles(symbol.clone(), &candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_mapping() {
        let adapter = ChartAdapter::new(reqwest::Client::new(), "http://localhost");
        assert_eq!(adapter.ticker_for(&Symbol::new("NIFTY").unwrap()), "^NSEI");
        assert_eq!(
            adapter.ticker_for(&Symbol::new("BANKNIFTY").unwrap()),
            "^NSEBANK"
        );
        assert_eq!(
            adapter.ticker_for(&Symbol::new("reliance").unwrap()),
            "RELIANCE.NS"
        );
    }

    #[test]
    fn test_into_candles_skips_null_bars() {
        let json = r#"{
            "timestamp": [1704168000, 1704254400, 1704340800],
            "indicators": {"quote": [{
                "open":   [10.0, null, 12.0],
                "high":   [11.0, 12.0, 13.0],
                "low":    [9.0, 10.0, 11.0],
                "close":  [10.5, 11.5, 12.5],
                "volume": [100, 200, 300]
            }]}
        }"#;
        let result: ChartResult = serde_json::from_str(json).unwrap();
        let candles = result.into_candles();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 12.5);
        assert_eq!(candles[1].volume, 300.0);
    }
}
