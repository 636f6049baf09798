//! NiftyTrader put-call-ratio adapter.
//!
//! API: `GET {base}/webapi/option/oi-pcr-data?type=otherpcr&expiry=&symbol={symbol}`
//!
//! Response shape: `{"result": {"oiDatas": [{"time": "09:20", "pcr": 0.41}, ...]}}`

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use tsm_common::MarketDataConfig;

use super::provider::{FetchError, PcrSource};
use super::rate_limiter::{shared_limiter, SharedRateLimiter};
use super::{PcrPoint, Symbol};

const SITE: &str = "https://niftytrader.in";

#[derive(Debug, Deserialize)]
struct PcrResponse {
    result: Option<PcrResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PcrResult {
    oi_datas: Option<Vec<RawPcrEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawPcrEntry {
    time: Option<String>,
    pcr: Option<f64>,
}

/// Intraday PCR series from NiftyTrader.
pub struct NiftyTraderPcrAdapter {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    limiter: SharedRateLimiter,
}

impl NiftyTraderPcrAdapter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(8),
            limiter: shared_limiter("niftytrader", 300),
        }
    }

    pub fn from_config(client: reqwest::Client, config: &MarketDataConfig) -> Self {
        Self {
            client,
            base_url: config.pcr_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.fetch_timeout_secs),
            limiter: shared_limiter("niftytrader", config.pcr_requests_per_minute),
        }
    }

    pub fn with_limiter(mut self, limiter: SharedRateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(REFERER, HeaderValue::from_static("https://niftytrader.in/"));
        headers.insert(ORIGIN, HeaderValue::from_static(SITE));
        headers
    }
}

#[async_trait]
impl PcrSource for NiftyTraderPcrAdapter {
    fn name(&self) -> &'static str {
        "niftytrader"
    }

    async fn fetch_pcr_series(&self, symbol: &Symbol) -> Result<Vec<PcrPoint>, FetchError> {
        self.limiter.acquire().await;

        let endpoint = format!("{}/webapi/option/oi-pcr-data", self.base_url);
        let response = self
            .client
            .get(&endpoint)
            .query(&[
                ("type", "otherpcr"),
                ("expiry", ""),
                ("symbol", symbol.as_str()),
            ])
            .headers(Self::headers())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status, &endpoint, self.name()));
        }

        let body: PcrResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(format!("PCR for {}: {}", symbol, e)))?;

        let entries = body
            .result
            .and_then(|r| r.oi_datas)
            .ok_or_else(|| FetchError::Parse(format!("PCR for {}: missing result.oiDatas", symbol)))?;

        let total = entries.len();
        let points: Vec<PcrPoint> = entries
            .into_iter()
            .filter_map(|e| Some(PcrPoint::new(e.time?, e.pcr?)))
            .collect();

        debug!(
            symbol = %symbol,
            points = points.len(),
            skipped = total - points.len(),
            "Fetched PCR series"
        );
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_incomplete_entries() {
        let json = r#"{"result": {"oiDatas": [
            {"time": "09:20", "pcr": 0.41},
            {"time": "09:25"},
            {"pcr": 0.5},
            {"time": "09:30:00", "pcr": 0.47}
        ]}}"#;
        let body: PcrResponse = serde_json::from_str(json).unwrap();
        let entries = body.result.unwrap().oi_datas.unwrap();
        let points: Vec<_> = entries
            .into_iter()
            .filter_map(|e| Some(PcrPoint::new(e.time?, e.pcr?)))
            .collect();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].time, "09:30:00");
    }

    #[test]
    fn test_missing_result_deserialises() {
        let body: PcrResponse = serde_json::from_str(r#"{"status": 0}"#).unwrap();
        assert!(body.result.is_none());
    }
}
