//! TSM Scanner Library
//!
//! Signal scanning engine for the F&O universe: an intraday breakout and
//! momentum scanner, and a put-call-ratio storm detector.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     tsm-scanner (Rust Service)                      │
//! │                              :4480                                  │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  Universe ──► Batch Scheduler ──► Snapshot / PCR fetch (per symbol) │
//! │                                      │                              │
//! │                        Scoring Engine / Movement Detector           │
//! │                                      │                              │
//! │                                 Result Ranker ──► ResultSink        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Scanner
//! - Point-based score over volume, momentum, breakout proximity, RSI and
//!   moving-average alignment
//! - Post-filtered by scan type (BREAKOUT, HIGH_VOLUME, MOMENTUM)
//!
//! ## Storm Detector
//! - Baseline is the first PCR point inside the requested window
//! - Only series that open below the entry ceiling (0.49) are tracked
//! - First point moving at least the threshold percent triggers
//!
//! ## Degraded Mode
//! - Symbol universe falls back to a static list
//! - Per-symbol failures are counted, never fatal

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod batch;
pub mod clock;
pub mod data;
pub mod engine;
pub mod ranker;
pub mod routes;
pub mod scanner;
pub mod scheduler;
pub mod sink;
pub mod storm;
pub mod util;

pub use batch::{BatchConfig, BatchRun, BatchScheduler, SymbolFailure};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{
    ScanContext, ScanError, ScanOutcome, ScanRequest, ScanSummary, SignalEngine, StormOutcome,
    StormRequest, StormSummary,
};
pub use routes::build_router;
pub use scheduler::{StormScheduler, TickOutcome};
pub use sink::{LatestResults, ResultSink};

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tsm_common::config::Config;
use tsm_common::ValidationError;

use crate::data::{SnapshotCache, TechnicalSnapshot};

/// Scanner service state
pub struct ScannerState {
    /// Configuration
    pub config: Config,
    /// Scan engine
    pub engine: Arc<SignalEngine>,
    /// Most recent runs
    pub latest: Arc<LatestResults>,
    /// Snapshot cache shared by HTTP-triggered scans
    pub cache: Option<Arc<SnapshotCache<TechnicalSnapshot>>>,
}

impl ScannerState {
    pub fn new(config: Config) -> Result<Self, ValidationError> {
        let engine = Arc::new(SignalEngine::from_config(&config)?);
        Ok(Self::with_engine(config, engine))
    }

    /// State around an already-built engine.
    pub fn with_engine(config: Config, engine: Arc<SignalEngine>) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(SnapshotCache::new(config.cache.snapshot_ttl_secs)));

        Self {
            config,
            engine,
            latest: Arc::new(LatestResults::new()),
            cache,
        }
    }

    /// Context for one HTTP-triggered run.
    pub fn context(&self) -> ScanContext {
        match &self.cache {
            Some(cache) => ScanContext::new().with_cache(cache.clone()),
            None => ScanContext::new(),
        }
    }
}

pub struct ScannerService {
    state: Arc<ScannerState>,
}

impl ScannerService {
    pub fn new(config: Config) -> Result<Self> {
        let state = ScannerState::new(config).context("Failed to build scan engine")?;
        Ok(Self {
            state: Arc::new(state),
        })
    }

    pub fn state(&self) -> Arc<ScannerState> {
        self.state.clone()
    }

    pub async fn start(self) -> Result<()> {
        let config = &self.state.config;
        let shutdown = CancellationToken::new();

        let app = build_router(self.state.clone());

        if config.storm.window_job.enabled {
            let scheduler = StormScheduler::from_config(
                self.state.engine.clone(),
                self.state.latest.clone(),
                &config.storm,
            )
            .context("Invalid storm window job configuration")?;
            let cancel = shutdown.child_token();
            tokio::spawn(async move { scheduler.run(cancel).await });
        } else {
            tracing::info!("Storm window job disabled");
        }

        if let Some(cache) = self.state.cache.clone() {
            let cancel = shutdown.child_token();
            let every = Duration::from_secs(config.cache.snapshot_ttl_secs.max(1) as u64);
            tokio::spawn(async move { sweep_cache(cache, every, cancel).await });
        }

        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .context("Invalid server address")?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        let signal = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Shutdown signal received");
                }
                signal.cancel();
            })
            .await?;

        shutdown.cancel();
        Ok(())
    }
}

async fn sweep_cache(
    cache: Arc<SnapshotCache<TechnicalSnapshot>>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let removed = cache.clear_expired();
                if removed > 0 {
                    tracing::debug!(removed, "Expired snapshots swept");
                }
            }
        }
    }
}
