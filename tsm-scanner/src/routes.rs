//! HTTP routes for the scanner service.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::warn;
use tsm_common::ValidationError;

use crate::batch::SymbolFailure;
use crate::engine::{ScanContext, ScanError, ScanRequest, ScanSummary, StormRequest, StormSummary};
use crate::scanner::{ScanResult, ScanType};
use crate::sink::{Published, ResultSink};
use crate::storm::StormResult;
use crate::ScannerState;

/// Request bodies are tiny; anything larger is rejected.
const MAX_BODY_BYTES: usize = 16 * 1024;

// ============================================================================
// Router
// ============================================================================

/// Build the service router.
pub fn build_router(state: Arc<ScannerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/scanner", post(run_scanner))
        .route("/api/v1/scanner/latest", get(latest_scan))
        .route("/api/v1/storm", post(run_storm))
        .route("/api/v1/storm/latest", get(latest_storm))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

/// Scanner request body. Omitted fields take the configured defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerBody {
    pub scan_type: Option<String>,
    pub min_score: Option<u32>,
    pub max_results: Option<usize>,
}

/// Storm request body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StormBody {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub threshold_percent: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    pub results: Vec<ScanResult>,
    pub summary: ScanSummary,
    pub failures: Vec<SymbolFailure>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StormResponse {
    pub success: bool,
    pub results: Vec<StormResult>,
    pub summary: StormSummary,
    pub failures: Vec<SymbolFailure>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LatestResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub latest: Published<T>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error body: `{"success": false, "error": "...", "results": []}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ScanError::Validation(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": self.message,
            "results": [],
        });
        (self.status, Json(body)).into_response()
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "tsm-scanner".to_string(),
    })
}

/// Run the intraday scanner
pub async fn run_scanner(
    State(state): State<Arc<ScannerState>>,
    body: Result<Json<ScannerBody>, JsonRejection>,
) -> Result<Json<ScanResponse>, ApiError> {
    let Json(body) = body?;
    let defaults = &state.config.scanner;

    let scan_type = match body.scan_type.as_deref() {
        Some(raw) => raw
            .parse::<ScanType>()
            .map_err(|e| ValidationError::invalid("scanType", e))?,
        None => ScanType::default(),
    };
    let request = ScanRequest {
        scan_type,
        min_score: body.min_score.unwrap_or(defaults.default_min_score),
        max_results: body.max_results.unwrap_or(defaults.default_max_results),
    };

    let outcome = state.engine.run_scan(&request, &state.context()).await?;
    if let Err(e) = state.latest.publish_scan(&outcome).await {
        warn!(error = %e, "Failed to store latest scan");
    }

    Ok(Json(ScanResponse {
        success: true,
        results: outcome.results,
        summary: outcome.summary,
        failures: outcome.failures,
        timestamp: Utc::now(),
    }))
}

/// Run the PCR storm detector
pub async fn run_storm(
    State(state): State<Arc<ScannerState>>,
    body: Result<Json<StormBody>, JsonRejection>,
) -> Result<Json<StormResponse>, ApiError> {
    let Json(body) = body?;
    let request = StormRequest {
        start_time: body.start_time,
        end_time: body.end_time,
        threshold_percent: body
            .threshold_percent
            .unwrap_or(state.config.storm.default_threshold_percent),
    };

    let outcome = state.engine.run_storm_scan(&request, &state.context()).await?;
    if let Err(e) = state.latest.publish_storm(&outcome).await {
        warn!(error = %e, "Failed to store latest storm scan");
    }

    Ok(Json(StormResponse {
        success: true,
        results: outcome.results,
        summary: outcome.summary,
        failures: outcome.failures,
        timestamp: Utc::now(),
    }))
}

/// Most recent scanner run
pub async fn latest_scan(
    State(state): State<Arc<ScannerState>>,
) -> Result<Json<LatestResponse<crate::engine::ScanOutcome>>, ApiError> {
    state
        .latest
        .latest_scan()
        .await
        .map(|latest| {
            Json(LatestResponse {
                success: true,
                latest,
            })
        })
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "No scanner run has completed yet"))
}

/// Most recent storm run
pub async fn latest_storm(
    State(state): State<Arc<ScannerState>>,
) -> Result<Json<LatestResponse<crate::engine::StormOutcome>>, ApiError> {
    state
        .latest
        .latest_storm()
        .await
        .map(|latest| {
            Json(LatestResponse {
                success: true,
                latest,
            })
        })
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "No storm run has completed yet"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use tsm_common::Config;

    fn app() -> Router {
        // No Supabase and an unroutable market-data host: every fetch fails fast
        let mut config = Config::default();
        config.market_data.chart_base_url = "http://127.0.0.1:9".to_string();
        config.market_data.pcr_base_url = "http://127.0.0.1:9".to_string();
        config.universe.fallback_symbols = vec!["TCS".to_string()];
        build_router(Arc::new(ScannerState::new(config).unwrap()))
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["service"], "tsm-scanner");
    }

    #[tokio::test]
    async fn test_storm_requires_times() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/storm")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"startTime": "09:25"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["results"], serde_json::json!([]));
        assert!(json["error"].as_str().unwrap().contains("endTime"));
    }

    #[tokio::test]
    async fn test_unknown_scan_type_is_rejected() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/scanner")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"scanType": "GAP_UP"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_json_uses_error_shape() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/scanner")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_latest_before_any_run() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/storm/latest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
