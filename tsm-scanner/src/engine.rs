//! Scan façade.
//!
//! [`SignalEngine`] ties the pieces together for one invocation:
//! universe → batched fetch → score or detect → rank. Both entry points
//! validate their request before touching the network, and both return a
//! summary even when some symbols failed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use tsm_common::logging::generate_trace_id;
use tsm_common::{Config, Validate, ValidationError, ValidationResult};

use crate::batch::{BatchConfig, BatchScheduler, SymbolFailure};
use crate::clock::{Clock, SystemClock};
use crate::data::{
    http_client, ChartAdapter, FetchError, NiftyTraderPcrAdapter, PcrSource, RateLimiter,
    SnapshotCache, TechnicalSnapshot, TechnicalSource, UniverseResolver, UniverseSource,
};
use crate::ranker::{rank_scan_results, rank_storm_results};
use crate::scanner::{ScanResult, ScanType, ScoringConfig, ScoringEngine};
use crate::storm::{StormDetector, StormResult, TimeWindow};

/// Largest `max_results` a caller may ask for.
pub const MAX_RESULTS_LIMIT: usize = 500;

// ============================================================================
// Errors
// ============================================================================

/// Why a scan could not run at all.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    /// Rejected before any work began
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No symbols even after falling back to the static list
    #[error("No symbols found for scanning")]
    EmptyUniverse,
}

impl ScanError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::EmptyUniverse => 404,
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Parameters for a scanner run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    #[serde(default)]
    pub scan_type: ScanType,
    #[serde(default = "default_min_score")]
    pub min_score: u32,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            scan_type: ScanType::default(),
            min_score: default_min_score(),
            max_results: default_max_results(),
        }
    }
}

fn default_min_score() -> u32 {
    70
}

fn default_max_results() -> usize {
    20
}

impl Validate for ScanRequest {
    fn validate(&self) -> ValidationResult<()> {
        if self.max_results == 0 || self.max_results > MAX_RESULTS_LIMIT {
            return Err(ValidationError::invalid(
                "maxResults",
                format!("must be between 1 and {}", MAX_RESULTS_LIMIT),
            ));
        }
        if self.min_score > 100 {
            return Err(ValidationError::invalid("minScore", "must be between 0 and 100"));
        }
        Ok(())
    }
}

/// Parameters for a storm run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StormRequest {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default = "default_threshold_percent")]
    pub threshold_percent: f64,
}

fn default_threshold_percent() -> f64 {
    10.0
}

impl StormRequest {
    pub fn new(start_time: impl Into<String>, end_time: impl Into<String>, threshold_percent: f64) -> Self {
        Self {
            start_time: Some(start_time.into()),
            end_time: Some(end_time.into()),
            threshold_percent,
        }
    }

    /// Validate and parse the requested window.
    pub fn window(&self) -> ValidationResult<TimeWindow> {
        let start = non_blank(&self.start_time);
        let end = non_blank(&self.end_time);

        let (start, end) = match (start, end) {
            (Some(s), Some(e)) => (s, e),
            (None, Some(_)) => return Err(ValidationError::missing("startTime")),
            (Some(_), None) => return Err(ValidationError::missing("endTime")),
            (None, None) => {
                return Err(ValidationError::Multiple(vec![
                    ValidationError::missing("startTime"),
                    ValidationError::missing("endTime"),
                ]))
            }
        };

        if !self.threshold_percent.is_finite() || self.threshold_percent <= 0.0 {
            return Err(ValidationError::invalid(
                "thresholdPercent",
                "must be a positive number",
            ));
        }

        TimeWindow::parse(start, end)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Validate for StormRequest {
    fn validate(&self) -> ValidationResult<()> {
        self.window().map(|_| ())
    }
}

// ============================================================================
// Context and Outcomes
// ============================================================================

/// Per-invocation context owned by the caller.
#[derive(Clone)]
pub struct ScanContext {
    pub run_id: String,
    pub cancel: CancellationToken,
    pub cache: Option<Arc<SnapshotCache<TechnicalSnapshot>>>,
}

impl Default for ScanContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanContext {
    /// Fresh run ID, no cache, never cancelled.
    pub fn new() -> Self {
        Self {
            run_id: generate_trace_id(),
            cancel: CancellationToken::new(),
            cache: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_cache(mut self, cache: Arc<SnapshotCache<TechnicalSnapshot>>) -> Self {
        self.cache = Some(cache);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub run_id: String,
    pub total_scanned: usize,
    pub opportunities_found: usize,
    pub processed: usize,
    pub errors: usize,
    pub scan_type: ScanType,
    pub min_score: u32,
    pub top_score: u32,
    pub universe_source: UniverseSource,
    pub cancelled: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub results: Vec<ScanResult>,
    pub summary: ScanSummary,
    pub failures: Vec<SymbolFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StormSummary {
    pub run_id: String,
    pub total_symbols: usize,
    pub storms_found: usize,
    pub processed: usize,
    pub errors: usize,
    pub start_time: String,
    pub end_time: String,
    pub threshold_percent: f64,
    pub universe_source: UniverseSource,
    pub cancelled: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StormOutcome {
    pub results: Vec<StormResult>,
    pub summary: StormSummary,
    pub failures: Vec<SymbolFailure>,
}

// ============================================================================
// Engine
// ============================================================================

/// Signal scanning engine.
pub struct SignalEngine {
    universe: UniverseResolver,
    technicals: Arc<dyn TechnicalSource>,
    pcr: Arc<dyn PcrSource>,
    scoring: Arc<ScoringEngine>,
    detector: StormDetector,
    scan_batches: BatchScheduler,
    storm_batches: BatchScheduler,
    clock: Arc<dyn Clock>,
}

impl SignalEngine {
    pub fn new(
        universe: UniverseResolver,
        technicals: Arc<dyn TechnicalSource>,
        pcr: Arc<dyn PcrSource>,
        scan_batches: BatchConfig,
        storm_batches: BatchConfig,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            universe,
            technicals,
            pcr,
            scoring: Arc::new(ScoringEngine::default()),
            detector: StormDetector::default(),
            scan_batches: BatchScheduler::new(scan_batches)?,
            storm_batches: BatchScheduler::new(storm_batches)?,
            clock: Arc::new(SystemClock::ist()),
        })
    }

    /// Wire the HTTP adapters from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ValidationError> {
        let md = &config.market_data;
        let fetch_timeout = Duration::from_secs(md.fetch_timeout_secs);
        let client = http_client(fetch_timeout);

        let universe = UniverseResolver::from_config(client.clone(), &config.universe, fetch_timeout);
        let technicals = Arc::new(ChartAdapter::from_config(client.clone(), md));
        let pcr = Arc::new(NiftyTraderPcrAdapter::from_config(client, md));

        let engine = Self::new(
            universe,
            technicals,
            pcr,
            BatchConfig {
                batch_size: config.scanner.batch_size,
                inter_batch_delay: Duration::from_millis(config.scanner.inter_batch_delay_ms),
                fetch_timeout: paced_task_deadline(
                    fetch_timeout,
                    config.scanner.batch_size,
                    md.chart_requests_per_minute,
                ),
            },
            BatchConfig {
                batch_size: config.storm.batch_size,
                inter_batch_delay: Duration::from_millis(config.storm.inter_batch_delay_ms),
                fetch_timeout: paced_task_deadline(
                    fetch_timeout,
                    config.storm.batch_size,
                    md.pcr_requests_per_minute,
                ),
            },
        )?;

        Ok(engine
            .with_detector(StormDetector::new(config.storm.entry_pcr_ceiling))
            .with_clock(Arc::new(SystemClock::new(
                config.storm.window_job.utc_offset_minutes,
            ))))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_detector(mut self, detector: StormDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_scoring(mut self, config: ScoringConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        self.scoring = Arc::new(ScoringEngine::new(config));
        Ok(self)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Run the intraday scanner.
    pub async fn run_scan(
        &self,
        request: &ScanRequest,
        ctx: &ScanContext,
    ) -> Result<ScanOutcome, ScanError> {
        request.validate()?;

        let span = info_span!("scan", run_id = %ctx.run_id, scan_type = %request.scan_type);
        async {
            let started = Instant::now();
            let universe = self.universe.resolve().await;
            if universe.symbols.is_empty() {
                return Err(ScanError::EmptyUniverse);
            }

            info!(
                symbols = universe.symbols.len(),
                source = ?universe.source,
                min_score = request.min_score,
                max_results = request.max_results,
                "Scanner started"
            );

            let now = self.clock.time_of_day();
            let scan_type = request.scan_type;
            let run = self
                .scan_batches
                .run(&universe.symbols, &ctx.cancel, |symbol| {
                    let source = self.technicals.clone();
                    let scoring = self.scoring.clone();
                    let cache = ctx.cache.clone();
                    async move {
                        let snapshot = match cache.as_ref().and_then(|c| c.get(&symbol)) {
                            Some(hit) => hit,
                            None => {
                                let fresh = source.fetch_snapshot(&symbol).await?;
                                if !fresh.is_well_formed() {
                                    return Err(FetchError::Parse(format!(
                                        "malformed snapshot for {}",
                                        symbol
                                    )));
                                }
                                if let Some(cache) = &cache {
                                    cache.insert(symbol.clone(), fresh.clone());
                                }
                                fresh
                            }
                        };
                        Ok::<_, FetchError>(scoring.score(&snapshot, scan_type, now))
                    }
                })
                .await;

            let results = rank_scan_results(run.results, request.min_score, request.max_results);
            let summary = ScanSummary {
                run_id: ctx.run_id.clone(),
                total_scanned: universe.symbols.len(),
                opportunities_found: results.len(),
                processed: run.processed,
                errors: run.errors,
                scan_type,
                min_score: request.min_score,
                top_score: results.first().map(|r| r.score).unwrap_or(0),
                universe_source: universe.source,
                cancelled: run.cancelled,
                duration_ms: started.elapsed().as_millis() as u64,
            };

            info!(
                found = summary.opportunities_found,
                processed = summary.processed,
                errors = summary.errors,
                top_score = summary.top_score,
                cancelled = summary.cancelled,
                duration_ms = summary.duration_ms,
                "Scanner complete"
            );

            Ok(ScanOutcome {
                results,
                summary,
                failures: run.failures,
            })
        }
        .instrument(span)
        .await
    }

    /// Run the PCR storm detector.
    pub async fn run_storm_scan(
        &self,
        request: &StormRequest,
        ctx: &ScanContext,
    ) -> Result<StormOutcome, ScanError> {
        let window = request.window()?;
        let start_time = non_blank(&request.start_time).unwrap_or_default().to_string();
        let end_time = non_blank(&request.end_time).unwrap_or_default().to_string();
        let threshold = request.threshold_percent;

        let span = info_span!("storm", run_id = %ctx.run_id, window = %window);
        async {
            let started = Instant::now();
            let universe = self.universe.resolve().await;
            if universe.symbols.is_empty() {
                return Err(ScanError::EmptyUniverse);
            }

            info!(
                symbols = universe.symbols.len(),
                source = ?universe.source,
                threshold_percent = threshold,
                "Storm scan started"
            );

            let run = self
                .storm_batches
                .run(&universe.symbols, &ctx.cancel, |symbol| {
                    let source = self.pcr.clone();
                    let detector = self.detector;
                    let clock = self.clock.clone();
                    let start_time = start_time.clone();
                    async move {
                        let series = source.fetch_pcr_series(&symbol).await?;
                        Ok::<_, FetchError>(detector.detect(&series, &window, threshold).map(|movement| {
                            StormResult::from_movement(
                                symbol,
                                &start_time,
                                movement,
                                clock.now().with_timezone(&Utc),
                            )
                        }))
                    }
                })
                .await;

            let results = rank_storm_results(run.results);
            let summary = StormSummary {
                run_id: ctx.run_id.clone(),
                total_symbols: universe.symbols.len(),
                storms_found: results.len(),
                processed: run.processed,
                errors: run.errors,
                start_time: start_time.clone(),
                end_time,
                threshold_percent: threshold,
                universe_source: universe.source,
                cancelled: run.cancelled,
                duration_ms: started.elapsed().as_millis() as u64,
            };

            info!(
                found = summary.storms_found,
                processed = summary.processed,
                errors = summary.errors,
                cancelled = summary.cancelled,
                duration_ms = summary.duration_ms,
                "Storm scan complete"
            );

            Ok(StormOutcome {
                results,
                summary,
                failures: run.failures,
            })
        }
        .instrument(span)
        .await
    }
}

/// Per-symbol task deadline for a batch paced by an adapter's rate limiter.
///
/// Twice the fetch timeout, plus the longest the last task of a full batch
/// can queue for a token before its request starts.
fn paced_task_deadline(
    fetch_timeout: Duration,
    batch_size: usize,
    requests_per_minute: u32,
) -> Duration {
    fetch_timeout * 2 + RateLimiter::max_queue_wait(requests_per_minute, batch_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{shared_limiter, Symbol};
    use test_case::test_case;

    #[test]
    fn test_scan_request_defaults() {
        let request: ScanRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, ScanRequest::default());
        assert_eq!(request.scan_type, ScanType::Breakout);
        assert_eq!(request.min_score, 70);
        assert_eq!(request.max_results, 20);

        let request: ScanRequest =
            serde_json::from_str(r#"{"scanType": "MOMENTUM", "maxResults": 5}"#).unwrap();
        assert_eq!(request.scan_type, ScanType::Momentum);
        assert_eq!(request.max_results, 5);
    }

    #[test_case(0, 70 => false ; "zero results")]
    #[test_case(501, 70 => false ; "too many results")]
    #[test_case(20, 101 => false ; "score above range")]
    #[test_case(1, 0 => true ; "lower bounds")]
    #[test_case(500, 100 => true ; "upper bounds")]
    fn test_scan_request_validation(max_results: usize, min_score: u32) -> bool {
        ScanRequest {
            scan_type: ScanType::Breakout,
            min_score,
            max_results,
        }
        .validate()
        .is_ok()
    }

    #[test]
    fn test_storm_request_missing_times() {
        let request: StormRequest = serde_json::from_str(r#"{"endTime": "10:25"}"#).unwrap();
        assert_eq!(
            request.validate(),
            Err(ValidationError::missing("startTime"))
        );

        let request: StormRequest = serde_json::from_str(r#"{"startTime": " "}"#).unwrap();
        assert!(matches!(request.validate(), Err(ValidationError::Multiple(_))));
    }

    #[test]
    fn test_storm_request_threshold_and_window() {
        let request = StormRequest::new("09:25", "10:25", 0.0);
        assert!(matches!(
            request.validate(),
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "thresholdPercent"
        ));

        let request: StormRequest =
            serde_json::from_str(r#"{"startTime": "09:25", "endTime": "10:25"}"#).unwrap();
        assert_eq!(request.threshold_percent, 10.0);
        let window = request.window().unwrap();
        assert_eq!(window.to_string(), "09:25-10:25");
    }

    #[test]
    fn test_scan_error_mapping() {
        assert_eq!(ScanError::EmptyUniverse.status_code(), 404);
        let err: ScanError = ValidationError::missing("startTime").into();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Missing required field: startTime");
    }

    #[test]
    fn test_context_ids_are_unique() {
        assert_ne!(ScanContext::new().run_id, ScanContext::new().run_id);
    }

    #[test]
    fn test_paced_task_deadline() {
        let fetch = Duration::from_secs(8);
        // Default sizing: a batch of 10 fits in the 120 rpm burst plus 4s
        assert_eq!(paced_task_deadline(fetch, 10, 120), Duration::from_secs(20));
        assert_eq!(paced_task_deadline(fetch, 2, 120), Duration::from_secs(16));
        assert_eq!(paced_task_deadline(fetch, 50, 120), Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_batch_waiting_on_limiter_does_not_time_out() {
        let symbols: Vec<Symbol> = (0..50)
            .map(|i| Symbol::new(format!("SYM{i}")).unwrap())
            .collect();
        let limiter = shared_limiter("test", 120);
        let scheduler = BatchScheduler::new(BatchConfig {
            batch_size: 50,
            inter_batch_delay: Duration::ZERO,
            fetch_timeout: paced_task_deadline(Duration::from_secs(8), 50, 120),
        })
        .unwrap();

        let run = scheduler
            .run(&symbols, &CancellationToken::new(), |symbol| {
                let limiter = limiter.clone();
                async move {
                    limiter.acquire().await;
                    Ok::<_, FetchError>(Some(symbol))
                }
            })
            .await;

        assert_eq!(run.errors, 0);
        assert_eq!(run.results.len(), 50);
    }
}
