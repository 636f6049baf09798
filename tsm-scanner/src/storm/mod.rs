//! PCR storm detector.
//!
//! Flags symbols whose put-call ratio opens low inside a session window and
//! then moves by at least a threshold percentage.

mod detector;
mod time;

pub use detector::{Direction, PcrMovement, StormDetector, StormResult, DEFAULT_ENTRY_PCR_CEILING};
pub use time::{seconds_of_day, InvalidTime, MinuteOfDay, TimeWindow};
