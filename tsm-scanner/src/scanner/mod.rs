//! Intraday breakout and momentum scanner.
//!
//! Scores each [`TechnicalSnapshot`](crate::data::TechnicalSnapshot) with a
//! point-based heuristic and keeps the ones that match the requested
//! [`ScanType`].

mod config;
mod scoring;
mod types;

pub use config::{
    BreakoutWeights, FilterThresholds, MomentumWeights, MovingAverageWeights, RiskThresholds,
    RsiWeights, ScoringConfig, VolumeWeights, SCORING_VERSION,
};
pub use scoring::ScoringEngine;
pub use types::{
    BreakoutType, RiskTier, ScanResult, ScanTechnicals, ScanType, SessionTag, SignalTag,
};
