//! Scanner result types.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::data::Symbol;

// ============================================================================
// Scan Type
// ============================================================================

/// Which post-filter a scan applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanType {
    /// Requires a resistance breakout or support breakdown
    #[default]
    Breakout,
    /// Requires relative volume of at least the high-volume floor
    HighVolume,
    /// Requires an absolute move of at least the momentum floor
    Momentum,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakout => "BREAKOUT",
            Self::HighVolume => "HIGH_VOLUME",
            Self::Momentum => "MOMENTUM",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "BREAKOUT" => Ok(Self::Breakout),
            "HIGH_VOLUME" => Ok(Self::HighVolume),
            "MOMENTUM" => Ok(Self::Momentum),
            other => Err(format!("unknown scan type: {}", other)),
        }
    }
}

// ============================================================================
// Tags
// ============================================================================

/// One fired scoring rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalTag {
    HighVolume,
    ElevatedVolume,
    StrongMomentum,
    ModerateMomentum,
    ResistanceBreakout,
    SupportBreakdown,
    RsiReversal,
    MaBullish,
    MaBearish,
}

impl SignalTag {
    /// Breakout or breakdown.
    pub fn is_breakout(&self) -> bool {
        matches!(self, Self::ResistanceBreakout | Self::SupportBreakdown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakoutType {
    BullishBreakout,
    BearishBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

/// Trading-session segment the scan ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionTag {
    Immediate,
    Morning,
    Afternoon,
    Late,
}

impl SessionTag {
    /// Tag for an exchange-local wall-clock time.
    pub fn at(time: NaiveTime) -> Self {
        match time.hour() {
            9..=10 => Self::Morning,
            11..=13 => Self::Afternoon,
            h if h >= 14 => Self::Late,
            _ => Self::Immediate,
        }
    }
}

// ============================================================================
// Result
// ============================================================================

/// Display technicals attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanTechnicals {
    pub ltp: f64,
    pub change_percent: f64,
    pub relative_volume: f64,
    pub rsi: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakout_type: Option<BreakoutType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
}

/// One scanner hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub symbol: Symbol,
    /// Display score, capped at the configured maximum
    pub score: u32,
    /// Accumulated points, used for thresholds and ranking
    pub raw_score: u32,
    pub signals: Vec<SignalTag>,
    pub technicals: ScanTechnicals,
    pub reasoning: String,
    pub risk: RiskTier,
    pub timeframe: SessionTag,
}

impl ScanResult {
    pub fn has_signal(&self, tag: SignalTag) -> bool {
        self.signals.contains(&tag)
    }
}
