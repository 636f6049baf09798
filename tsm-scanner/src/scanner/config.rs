//! Scoring configuration.
//!
//! Every threshold and point value the scoring engine uses lives here, under a
//! version number. Changing a weight means shipping a new version, so results
//! from different weight sets are never compared silently.

use serde::{Deserialize, Serialize};
use tsm_common::{Validate, ValidationError, ValidationResult};

/// Current scoring version.
pub const SCORING_VERSION: u32 = 1;

// ============================================================================
// Main Scoring Configuration
// ============================================================================

/// Versioned scoring weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub volume: VolumeWeights,

    #[serde(default)]
    pub momentum: MomentumWeights,

    #[serde(default)]
    pub breakout: BreakoutWeights,

    #[serde(default)]
    pub rsi: RsiWeights,

    #[serde(default)]
    pub moving_average: MovingAverageWeights,

    #[serde(default)]
    pub risk: RiskThresholds,

    #[serde(default)]
    pub filters: FilterThresholds,

    /// Reported scores are capped here; raw points are kept for ranking
    #[serde(default = "default_max_display_score")]
    pub max_display_score: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            volume: VolumeWeights::default(),
            momentum: MomentumWeights::default(),
            breakout: BreakoutWeights::default(),
            rsi: RsiWeights::default(),
            moving_average: MovingAverageWeights::default(),
            risk: RiskThresholds::default(),
            filters: FilterThresholds::default(),
            max_display_score: default_max_display_score(),
        }
    }
}

impl ScoringConfig {
    /// Highest score reachable when every rule fires.
    ///
    /// Breakout and breakdown are exclusive, so only the larger counts.
    pub fn max_points(&self) -> u32 {
        self.volume.high_points.max(self.volume.elevated_points)
            + self.momentum.strong_points.max(self.momentum.moderate_points)
            + self.breakout.breakout_points.max(self.breakout.breakdown_points)
            + self.rsi.reversal_points
            + self.moving_average.alignment_points
    }
}

fn default_version() -> u32 {
    SCORING_VERSION
}

fn default_max_display_score() -> u32 {
    100
}

// ============================================================================
// Rule Weights
// ============================================================================

/// Relative volume rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeWeights {
    /// Relative volume strictly above this is HIGH_VOLUME
    #[serde(default = "default_high_rvol")]
    pub high_threshold: f64,
    #[serde(default = "default_high_rvol_points")]
    pub high_points: u32,
    /// Relative volume strictly above this is ELEVATED_VOLUME
    #[serde(default = "default_elevated_rvol")]
    pub elevated_threshold: f64,
    #[serde(default = "default_elevated_rvol_points")]
    pub elevated_points: u32,
}

impl Default for VolumeWeights {
    fn default() -> Self {
        Self {
            high_threshold: default_high_rvol(),
            high_points: default_high_rvol_points(),
            elevated_threshold: default_elevated_rvol(),
            elevated_points: default_elevated_rvol_points(),
        }
    }
}

fn default_high_rvol() -> f64 {
    2.0
}

fn default_high_rvol_points() -> u32 {
    25
}

fn default_elevated_rvol() -> f64 {
    1.5
}

fn default_elevated_rvol_points() -> u32 {
    15
}

/// Absolute percent change rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumWeights {
    #[serde(default = "default_strong_move")]
    pub strong_threshold: f64,
    #[serde(default = "default_strong_move_points")]
    pub strong_points: u32,
    #[serde(default = "default_moderate_move")]
    pub moderate_threshold: f64,
    #[serde(default = "default_moderate_move_points")]
    pub moderate_points: u32,
}

impl Default for MomentumWeights {
    fn default() -> Self {
        Self {
            strong_threshold: default_strong_move(),
            strong_points: default_strong_move_points(),
            moderate_threshold: default_moderate_move(),
            moderate_points: default_moderate_move_points(),
        }
    }
}

fn default_strong_move() -> f64 {
    3.0
}

fn default_strong_move_points() -> u32 {
    20
}

fn default_moderate_move() -> f64 {
    1.5
}

fn default_moderate_move_points() -> u32 {
    10
}

/// Proximity to resistance or support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutWeights {
    /// Distance to the level, in percent of price, counted as "at" the level
    #[serde(default = "default_proximity_percent")]
    pub proximity_percent: f64,
    #[serde(default = "default_breakout_points")]
    pub breakout_points: u32,
    #[serde(default = "default_breakdown_points")]
    pub breakdown_points: u32,
    /// Target sits this fraction beyond the broken level
    #[serde(default = "default_target_extension")]
    pub target_extension: f64,
}

impl Default for BreakoutWeights {
    fn default() -> Self {
        Self {
            proximity_percent: default_proximity_percent(),
            breakout_points: default_breakout_points(),
            breakdown_points: default_breakdown_points(),
            target_extension: default_target_extension(),
        }
    }
}

fn default_proximity_percent() -> f64 {
    1.0
}

fn default_breakout_points() -> u32 {
    30
}

fn default_breakdown_points() -> u32 {
    25
}

fn default_target_extension() -> f64 {
    0.02
}

/// Oscillator reversal rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiWeights {
    #[serde(default = "default_oversold")]
    pub oversold: f64,
    #[serde(default = "default_overbought")]
    pub overbought: f64,
    #[serde(default = "default_reversal_points")]
    pub reversal_points: u32,
}

impl Default for RsiWeights {
    fn default() -> Self {
        Self {
            oversold: default_oversold(),
            overbought: default_overbought(),
            reversal_points: default_reversal_points(),
        }
    }
}

fn default_oversold() -> f64 {
    30.0
}

fn default_overbought() -> f64 {
    70.0
}

fn default_reversal_points() -> u32 {
    15
}

/// EMA9/EMA21 alignment rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverageWeights {
    #[serde(default = "default_alignment_points")]
    pub alignment_points: u32,
}

impl Default for MovingAverageWeights {
    fn default() -> Self {
        Self {
            alignment_points: default_alignment_points(),
        }
    }
}

fn default_alignment_points() -> u32 {
    5
}

/// Risk tier boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    #[serde(default = "default_high_risk_rvol")]
    pub high_relative_volume: f64,
    #[serde(default = "default_high_risk_move")]
    pub high_change_percent: f64,
    #[serde(default = "default_low_risk_rvol")]
    pub low_relative_volume: f64,
    #[serde(default = "default_low_risk_move")]
    pub low_change_percent: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high_relative_volume: default_high_risk_rvol(),
            high_change_percent: default_high_risk_move(),
            low_relative_volume: default_low_risk_rvol(),
            low_change_percent: default_low_risk_move(),
        }
    }
}

fn default_high_risk_rvol() -> f64 {
    3.0
}

fn default_high_risk_move() -> f64 {
    5.0
}

fn default_low_risk_rvol() -> f64 {
    1.2
}

fn default_low_risk_move() -> f64 {
    1.0
}

/// Post-filters applied after scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterThresholds {
    /// Results below this many raw points are dropped under every scan type
    #[serde(default = "default_min_points")]
    pub min_points: u32,
    #[serde(default = "default_high_volume_floor")]
    pub high_volume_min_relative_volume: f64,
    #[serde(default = "default_momentum_floor")]
    pub momentum_min_change_percent: f64,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self {
            min_points: default_min_points(),
            high_volume_min_relative_volume: default_high_volume_floor(),
            momentum_min_change_percent: default_momentum_floor(),
        }
    }
}

fn default_min_points() -> u32 {
    30
}

fn default_high_volume_floor() -> f64 {
    1.5
}

fn default_momentum_floor() -> f64 {
    1.0
}

// ============================================================================
// Validation
// ============================================================================

impl Validate for ScoringConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if self.version == 0 {
            errors.push(ValidationError::invalid("scoring.version", "must be at least 1"));
        }
        if self.volume.elevated_threshold >= self.volume.high_threshold {
            errors.push(ValidationError::Conflict {
                reason: "scoring.volume.elevated_threshold must be below high_threshold"
                    .to_string(),
            });
        }
        if self.momentum.moderate_threshold >= self.momentum.strong_threshold {
            errors.push(ValidationError::Conflict {
                reason: "scoring.momentum.moderate_threshold must be below strong_threshold"
                    .to_string(),
            });
        }
        if self.breakout.proximity_percent <= 0.0 {
            errors.push(ValidationError::invalid(
                "scoring.breakout.proximity_percent",
                "must be positive",
            ));
        }
        if self.rsi.oversold >= self.rsi.overbought {
            errors.push(ValidationError::Conflict {
                reason: "scoring.rsi.oversold must be below overbought".to_string(),
            });
        }
        if self.max_display_score == 0 {
            errors.push(ValidationError::invalid(
                "scoring.max_display_score",
                "must be greater than 0",
            ));
        }

        ValidationError::collect(errors)
    }
}
