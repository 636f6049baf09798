//! Injected wall clock.
//!
//! Anything that branches on the time of day (timeframe tagging, the storm
//! window gate) reads it from a [`Clock`] so tests can pin it.

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Utc};

/// IST offset from UTC in minutes.
pub const IST_OFFSET_MINUTES: i32 = 330;

/// Source of "now" in exchange-local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    /// Exchange-local wall-clock time.
    fn time_of_day(&self) -> NaiveTime {
        self.now().time()
    }
}

/// System time shifted to a fixed exchange offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Offsets outside ±24h fall back to UTC.
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    /// India Standard Time (+05:30).
    pub fn ist() -> Self {
        Self::new(IST_OFFSET_MINUTES)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::ist()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<FixedOffset>);

impl FixedClock {
    pub fn new(at: DateTime<FixedOffset>) -> Self {
        Self(at)
    }

    /// Parse an RFC 3339 timestamp, e.g. `2024-06-03T09:40:00+05:30`.
    pub fn parse(rfc3339: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(rfc3339).map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
