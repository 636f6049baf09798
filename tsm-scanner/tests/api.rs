//! HTTP API tests driven through the router with in-memory providers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use tsm_common::Config;
use tsm_scanner::batch::BatchConfig;
use tsm_scanner::clock::FixedClock;
use tsm_scanner::data::{
    normalize_symbols, FetchError, PcrPoint, PcrSource, Symbol, TechnicalSnapshot,
    TechnicalSource, UniverseResolver,
};
use tsm_scanner::{build_router, ScannerState, SignalEngine};

struct HotTechnicals;

#[async_trait]
impl TechnicalSource for HotTechnicals {
    fn name(&self) -> &'static str {
        "hot"
    }

    async fn fetch_snapshot(&self, symbol: &Symbol) -> Result<TechnicalSnapshot, FetchError> {
        if symbol.as_str() == "BROKEN" {
            return Err(FetchError::Timeout(Duration::from_secs(8)));
        }
        Ok(TechnicalSnapshot {
            symbol: symbol.clone(),
            ltp: 100.0,
            change: 3.5,
            change_percent: 3.5,
            volume: 2_400.0,
            avg_volume_20: 1_000.0,
            relative_volume: 2.4,
            high: 101.0,
            low: 97.0,
            open: 97.0,
            close: 100.0,
            rsi: 62.0,
            ema9: 99.0,
            ema21: 97.0,
            resistance: 100.5,
            support: 95.0,
        })
    }
}

struct RisingPcr;

#[async_trait]
impl PcrSource for RisingPcr {
    fn name(&self) -> &'static str {
        "rising"
    }

    async fn fetch_pcr_series(&self, _symbol: &Symbol) -> Result<Vec<PcrPoint>, FetchError> {
        Ok(vec![
            PcrPoint::new("09:15", 0.30),
            PcrPoint::new("09:20", 0.36),
        ])
    }
}

fn app() -> Router {
    let batches = BatchConfig {
        batch_size: 5,
        inter_batch_delay: Duration::from_millis(1),
        fetch_timeout: Duration::from_secs(2),
    };
    let engine = SignalEngine::new(
        UniverseResolver::fallback_only(normalize_symbols(["TCS", "BROKEN", "INFY"])),
        Arc::new(HotTechnicals),
        Arc::new(RisingPcr),
        batches.clone(),
        batches,
    )
    .unwrap()
    .with_clock(Arc::new(
        FixedClock::parse("2024-06-03T09:30:00+05:30").unwrap(),
    ));

    let state = ScannerState::with_engine(Config::default(), Arc::new(engine));
    build_router(Arc::new(state))
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_scanner_endpoint_returns_ranked_results() {
    let app = app();

    let response = app
        .clone()
        .oneshot(post("/api/v1/scanner", r#"{"scanType": "breakout", "minScore": 70}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["success"], true);
    let symbols: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["symbol"].as_str().unwrap())
        .collect();
    assert_eq!(symbols, vec!["INFY", "TCS"]);
    assert_eq!(body["results"][0]["score"], 80);
    assert_eq!(body["results"][0]["technicals"]["breakoutType"], "BULLISH_BREAKOUT");
    assert_eq!(body["summary"]["errors"], 1);
    assert_eq!(body["failures"][0]["symbol"], "BROKEN");

    // The run is now the latest one
    let response = app.oneshot(get("/api/v1/scanner/latest")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let latest = json(response).await;
    assert_eq!(latest["summary"]["run_id"], body["summary"]["run_id"]);
}

#[tokio::test]
async fn test_storm_endpoint_reports_movements() {
    let app = app();

    let response = app
        .clone()
        .oneshot(post(
            "/api/v1/storm",
            r#"{"startTime": "09:15", "endTime": "09:30", "thresholdPercent": 15}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["start_time"], "09:15");
    assert_eq!(results[0]["trigger_time"], "09:20");
    assert_eq!(results[0]["change_percent"], 20.0);
    assert_eq!(results[0]["direction"], "increase");
    assert!(results[0]["timestamp"].is_string());

    let response = app.oneshot(get("/api/v1/storm/latest")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_out_of_range_max_results() {
    let response = app()
        .oneshot(post("/api/v1/scanner", r#"{"maxResults": 0}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["success"], false);
}
