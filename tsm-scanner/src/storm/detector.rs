//! PCR movement detection.
//!
//! The first in-window point sets the baseline. Baselines at or above the
//! entry ceiling are not tracked at all. After that, the first in-window
//! point whose move from the baseline reaches the threshold is the trigger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::time::{seconds_of_day, MinuteOfDay, TimeWindow};
use crate::data::{PcrPoint, Symbol};
use crate::util::round_to;

/// Default entry ceiling: only series that open below this PCR are tracked.
pub const DEFAULT_ENTRY_PCR_CEILING: f64 = 0.49;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

/// Raw detector output, before rounding for display.
#[derive(Debug, Clone, PartialEq)]
pub struct PcrMovement {
    /// Time string of the baseline point
    pub start_point_time: String,
    pub trigger_time: String,
    pub trigger_minute: MinuteOfDay,
    pub start_pcr: f64,
    pub changed_pcr: f64,
    pub change_percent: f64,
    pub direction: Direction,
}

/// One detected PCR storm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StormResult {
    pub symbol: Symbol,
    /// Requested window start, as given
    pub start_time: String,
    /// Time string of the triggering point, as received
    pub trigger_time: String,
    pub start_pcr: f64,
    pub changed_pcr: f64,
    pub change_percent: f64,
    pub direction: Direction,
    #[serde(rename = "timestamp")]
    pub detected_at: DateTime<Utc>,
}

impl StormResult {
    /// Build a display result from a raw movement.
    pub fn from_movement(
        symbol: Symbol,
        window_start: &str,
        movement: PcrMovement,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol,
            start_time: window_start.to_string(),
            trigger_time: movement.trigger_time,
            start_pcr: round_to(movement.start_pcr, 4),
            changed_pcr: round_to(movement.changed_pcr, 4),
            change_percent: round_to(movement.change_percent, 2),
            direction: movement.direction,
            detected_at,
        }
    }

    /// Trigger time as seconds since midnight, `None` if unparseable.
    pub fn trigger_seconds(&self) -> Option<u32> {
        seconds_of_day(&self.trigger_time).ok()
    }
}

/// Movement detector for the storm scan.
#[derive(Debug, Clone, Copy)]
pub struct StormDetector {
    entry_pcr_ceiling: f64,
}

impl Default for StormDetector {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRY_PCR_CEILING)
    }
}

impl StormDetector {
    pub fn new(entry_pcr_ceiling: f64) -> Self {
        Self { entry_pcr_ceiling }
    }

    pub fn entry_pcr_ceiling(&self) -> f64 {
        self.entry_pcr_ceiling
    }

    /// Find the first in-window move of at least `threshold_percent`.
    ///
    /// Points with an unparseable time or a negative or non-finite ratio are
    /// skipped. A non-positive baseline yields no result.
    pub fn detect(
        &self,
        series: &[PcrPoint],
        window: &TimeWindow,
        threshold_percent: f64,
    ) -> Option<PcrMovement> {
        let mut baseline: Option<(&PcrPoint, f64)> = None;

        for point in series {
            let Ok(minute) = MinuteOfDay::parse(&point.time) else {
                trace!(time = %point.time, "Skipping PCR point with malformed time");
                continue;
            };
            if !point.pcr.is_finite() || point.pcr < 0.0 {
                trace!(time = %point.time, pcr = point.pcr, "Skipping PCR point with invalid ratio");
                continue;
            }
            if !window.contains(minute) {
                continue;
            }

            let Some((start, start_pcr)) = baseline else {
                if point.pcr >= self.entry_pcr_ceiling || point.pcr <= 0.0 {
                    return None;
                }
                baseline = Some((point, point.pcr));
                continue;
            };

            let change_percent = (point.pcr - start_pcr).abs() / start_pcr * 100.0;
            if change_percent >= threshold_percent {
                return Some(PcrMovement {
                    start_point_time: start.time.clone(),
                    trigger_time: point.time.clone(),
                    trigger_minute: minute,
                    start_pcr,
                    changed_pcr: point.pcr,
                    change_percent,
                    direction: if point.pcr > start_pcr {
                        Direction::Increase
                    } else {
                        Direction::Decrease
                    },
                });
            }
        }

        None
    }
}
