//! Wall-clock times inside a trading session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tsm_common::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time of day: {0:?} (expected HH:MM or HH:MM:SS)")]
pub struct InvalidTime(pub String);

/// Minutes since midnight. Seconds are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MinuteOfDay(u16);

impl MinuteOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self((hour * 60 + minute) as u16))
        } else {
            None
        }
    }

    /// Parse `HH:MM` or `HH:MM:SS`.
    pub fn parse(raw: &str) -> Result<Self, InvalidTime> {
        let (hour, minute, _) = parse_hms(raw)?;
        Ok(Self((hour * 60 + minute) as u16))
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }

    pub fn hour(&self) -> u32 {
        u32::from(self.0 / 60)
    }

    pub fn minute(&self) -> u32 {
        u32::from(self.0 % 60)
    }
}

/// Seconds since midnight for `HH:MM` or `HH:MM:SS`.
pub fn seconds_of_day(raw: &str) -> Result<u32, InvalidTime> {
    let (hour, minute, second) = parse_hms(raw)?;
    Ok(hour * 3_600 + minute * 60 + second)
}

fn parse_hms(raw: &str) -> Result<(u32, u32, u32), InvalidTime> {
    let invalid = || InvalidTime(raw.to_string());
    let parts: Vec<&str> = raw.trim().split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(invalid());
    }

    let field = |s: &str| -> Result<u32, InvalidTime> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        s.parse().map_err(|_| invalid())
    };

    let hour = field(parts[0])?;
    let minute = field(parts[1])?;
    let second = parts.get(2).map(|s| field(s)).transpose()?.unwrap_or(0);
    if hour >= 24 || minute >= 60 || second >= 60 {
        return Err(invalid());
    }
    Ok((hour, minute, second))
}

impl FromStr for MinuteOfDay {
    type Err = InvalidTime;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl From<chrono::NaiveTime> for MinuteOfDay {
    fn from(time: chrono::NaiveTime) -> Self {
        use chrono::Timelike;
        Self((time.hour() * 60 + time.minute()) as u16)
    }
}

/// Inclusive window `[start, end]` within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: MinuteOfDay,
    pub end: MinuteOfDay,
}

impl TimeWindow {
    pub fn new(start: MinuteOfDay, end: MinuteOfDay) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::Conflict {
                reason: format!("window start {} is after end {}", start, end),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse both ends, naming the offending field on failure.
    pub fn parse(start: &str, end: &str) -> Result<Self, ValidationError> {
        let start = MinuteOfDay::parse(start)
            .map_err(|e| ValidationError::invalid("startTime", e.to_string()))?;
        let end = MinuteOfDay::parse(end)
            .map_err(|e| ValidationError::invalid("endTime", e.to_string()))?;
        Self::new(start, end)
    }

    pub fn contains(&self, time: MinuteOfDay) -> bool {
        time >= self.start && time <= self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("09:20" => Some(560) ; "hh mm")]
    #[test_case("9:05" => Some(545) ; "single digit hour")]
    #[test_case("09:30:45" => Some(570) ; "seconds ignored")]
    #[test_case(" 10:25 " => Some(625) ; "padded")]
    #[test_case("00:00" => Some(0) ; "midnight")]
    #[test_case("23:59:59" => Some(1439) ; "last minute")]
    #[test_case("24:00" => None ; "hour out of range")]
    #[test_case("09:60" => None ; "minute out of range")]
    #[test_case("09:30:60" => None ; "seconds out of range")]
    #[test_case("0930" => None ; "no separator")]
    #[test_case("09:3a" => None ; "non numeric")]
    #[test_case("-1:30" => None ; "negative")]
    #[test_case("09:30:00:00" => None ; "too many parts")]
    #[test_case("" => None ; "empty")]
    fn test_parse(raw: &str) -> Option<u16> {
        MinuteOfDay::parse(raw).ok().map(|m| m.minutes())
    }

    #[test_case("09:30" => Some(34_200) ; "no seconds")]
    #[test_case("09:30:10" => Some(34_210) ; "with seconds")]
    #[test_case("23:59:59" => Some(86_399) ; "last second")]
    #[test_case("09:30:60" => None ; "seconds out of range")]
    #[test_case("9.30" => None ; "wrong separator")]
    fn test_seconds_of_day(raw: &str) -> Option<u32> {
        seconds_of_day(raw).ok()
    }

    #[test]
    fn test_display() {
        assert_eq!(MinuteOfDay::parse("9:05").unwrap().to_string(), "09:05");
    }

    #[test]
    fn test_window_inclusive() {
        let window = TimeWindow::parse("09:20", "09:30").unwrap();
        assert!(window.contains(MinuteOfDay::new(9, 20).unwrap()));
        assert!(window.contains(MinuteOfDay::new(9, 30).unwrap()));
        assert!(!window.contains(MinuteOfDay::new(9, 31).unwrap()));
        assert!(!window.contains(MinuteOfDay::new(9, 19).unwrap()));
    }

    #[test]
    fn test_window_rejects_reversed_and_bad_fields() {
        assert!(matches!(
            TimeWindow::parse("10:00", "09:00"),
            Err(ValidationError::Conflict { .. })
        ));
        match TimeWindow::parse("09:00", "late") {
            Err(ValidationError::InvalidValue { field, .. }) => assert_eq!(field, "endTime"),
            other => panic!("unexpected: {:?}", other),
        }
        // Single-minute window is fine
        assert!(TimeWindow::parse("09:25", "09:25").is_ok());
    }
}
