//! Storm window job.
//!
//! Runs the storm scan on a fixed interval, but only while the injected
//! clock reads inside the session window (09:25-10:25 IST by default). Each
//! completed run is handed to the configured [`ResultSink`].
//!
//! # Configuration
//!
//! ```json
//! {
//!   "storm": {
//!     "window_job": {
//!       "enabled": true,
//!       "window_start": "09:25",
//!       "window_end": "10:25",
//!       "interval_secs": 300,
//!       "utc_offset_minutes": 330
//!     }
//!   }
//! }
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tsm_common::{StormConfig, ValidationError};

use crate::engine::{ScanContext, ScanError, SignalEngine, StormOutcome, StormRequest};
use crate::sink::ResultSink;
use crate::storm::{MinuteOfDay, TimeWindow};

/// Consecutive failed ticks before the job logs at error level.
const ALERT_THRESHOLD: u32 = 3;

/// What one tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// Clock was outside the session window
    OutsideWindow,
    Completed(StormOutcome),
    Failed(ScanError),
}

/// Interval-driven storm scan gated by the session window.
pub struct StormScheduler {
    engine: Arc<SignalEngine>,
    sink: Arc<dyn ResultSink>,
    session: TimeWindow,
    request: StormRequest,
    interval: Duration,
    failures: AtomicU32,
}

impl StormScheduler {
    pub fn new(
        engine: Arc<SignalEngine>,
        sink: Arc<dyn ResultSink>,
        request: StormRequest,
        interval: Duration,
    ) -> Result<Self, ValidationError> {
        if interval.is_zero() {
            return Err(ValidationError::invalid("interval", "must be greater than 0"));
        }
        let session = request.window()?;
        Ok(Self {
            engine,
            sink,
            session,
            request,
            interval,
            failures: AtomicU32::new(0),
        })
    }

    pub fn from_config(
        engine: Arc<SignalEngine>,
        sink: Arc<dyn ResultSink>,
        config: &StormConfig,
    ) -> Result<Self, ValidationError> {
        let job = &config.window_job;
        Self::new(
            engine,
            sink,
            StormRequest::new(
                job.window_start.clone(),
                job.window_end.clone(),
                config.default_threshold_percent,
            ),
            Duration::from_secs(job.interval_secs),
        )
    }

    /// Whether the engine's clock is inside the session window.
    pub fn in_session(&self) -> bool {
        let now = MinuteOfDay::from(self.engine.clock().time_of_day());
        self.session.contains(now)
    }

    /// Run one scan if inside the window.
    pub async fn tick(&self, cancel: &CancellationToken) -> TickOutcome {
        if !self.in_session() {
            debug!(window = %self.session, "Outside storm window, skipping");
            return TickOutcome::OutsideWindow;
        }

        let ctx = ScanContext::new().with_cancel(cancel.child_token());
        match self.engine.run_storm_scan(&self.request, &ctx).await {
            Ok(outcome) => {
                self.failures.store(0, Ordering::Relaxed);
                if let Err(e) = self.sink.publish_storm(&outcome).await {
                    warn!(run_id = %ctx.run_id, error = %e, "Failed to publish storm results");
                }
                TickOutcome::Completed(outcome)
            }
            Err(e) => {
                self.track_failure(&e);
                TickOutcome::Failed(e)
            }
        }
    }

    fn track_failure(&self, err: &ScanError) {
        let count = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= ALERT_THRESHOLD {
            error!(
                error = %err,
                consecutive_failures = count,
                "Storm window job keeps failing"
            );
        } else {
            warn!(error = %err, consecutive_failures = count, "Storm window job failed");
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Run until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            window = %self.session,
            interval_secs = self.interval.as_secs(),
            threshold_percent = self.request.threshold_percent,
            "Storm window job started"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick(&cancel).await;
                }
            }
        }

        info!("Storm window job stopped");
    }
}
