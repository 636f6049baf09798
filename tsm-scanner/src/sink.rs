//! Where completed runs go.
//!
//! The engine itself stores nothing. Callers that want results kept hand
//! each finished run to a [`ResultSink`]: the ranked results plus the list of
//! symbols that failed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::engine::{ScanOutcome, StormOutcome};

/// Persistence contract for completed runs.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn publish_scan(&self, outcome: &ScanOutcome) -> tsm_common::Result<()>;

    async fn publish_storm(&self, outcome: &StormOutcome) -> tsm_common::Result<()>;
}

/// A run and when it was published.
#[derive(Debug, Clone, Serialize)]
pub struct Published<T> {
    pub published_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: T,
}

/// Keeps the most recent run of each kind in memory.
#[derive(Default)]
pub struct LatestResults {
    scan: RwLock<Option<Published<ScanOutcome>>>,
    storm: RwLock<Option<Published<StormOutcome>>>,
}

impl LatestResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn latest_scan(&self) -> Option<Published<ScanOutcome>> {
        self.scan.read().await.clone()
    }

    pub async fn latest_storm(&self) -> Option<Published<StormOutcome>> {
        self.storm.read().await.clone()
    }
}

#[async_trait]
impl ResultSink for LatestResults {
    async fn publish_scan(&self, outcome: &ScanOutcome) -> tsm_common::Result<()> {
        debug!(run_id = %outcome.summary.run_id, "Storing latest scan");
        *self.scan.write().await = Some(Published {
            published_at: Utc::now(),
            outcome: outcome.clone(),
        });
        Ok(())
    }

    async fn publish_storm(&self, outcome: &StormOutcome) -> tsm_common::Result<()> {
        debug!(run_id = %outcome.summary.run_id, "Storing latest storm scan");
        *self.storm.write().await = Some(Published {
            published_at: Utc::now(),
            outcome: outcome.clone(),
        });
        Ok(())
    }
}
