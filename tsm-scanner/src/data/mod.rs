//! Market data for the F&O universe.
//!
//! Holds the data contracts the engine consumes and the adapters that fill
//! them from external sources.
//!
//! # Data Sources
//! - **Supabase** (`fno_symbols` table): the active symbol universe, with a
//!   static fallback list
//! - **Chart API**: daily OHLCV bars, reduced to a [`TechnicalSnapshot`]
//! - **NiftyTrader**: intraday put-call-ratio series per symbol

mod cache;
mod chart;
pub mod indicators;
mod niftytrader;
mod provider;
mod rate_limiter;
mod universe;

pub use cache::{CacheStats, SnapshotCache};
pub use chart::ChartAdapter;
pub use niftytrader::NiftyTraderPcrAdapter;
pub use provider::{FetchError, PcrSource, SymbolUniverse, TechnicalSource};
pub use rate_limiter::{shared_limiter, RateLimiter, SharedRateLimiter};
pub use universe::{
    normalize_symbols, ResolvedUniverse, StaticUniverse, SupabaseUniverse, UniverseResolver,
    UniverseSource,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Browser-like user agent; some upstream endpoints reject bare clients.
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Build the HTTP client shared by all adapters.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

// ============================================================================
// Core Data Types
// ============================================================================

/// Tradable instrument identifier, always trimmed uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Normalise a raw identifier. Returns `None` for blank input.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_uppercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::new(&value).ok_or_else(|| "symbol must not be empty".to_string())
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

/// Point-in-time technical read for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalSnapshot {
    pub symbol: Symbol,
    /// Last traded price
    pub ltp: f64,
    /// Absolute change vs previous close
    pub change: f64,
    /// Percent change vs previous close
    pub change_percent: f64,
    pub volume: f64,
    /// Mean volume of the 20 sessions before this one
    #[serde(rename = "avgVolume20")]
    pub avg_volume_20: f64,
    /// `volume / avg_volume_20`
    pub relative_volume: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub close: f64,
    /// RSI(14)
    pub rsi: f64,
    pub ema9: f64,
    pub ema21: f64,
    pub resistance: f64,
    pub support: f64,
}

impl TechnicalSnapshot {
    /// All numeric fields finite, a positive price and non-negative relative volume.
    pub fn is_well_formed(&self) -> bool {
        let fields = [
            self.ltp,
            self.change,
            self.change_percent,
            self.volume,
            self.avg_volume_20,
            self.relative_volume,
            self.high,
            self.low,
            self.open,
            self.close,
            self.rsi,
            self.ema9,
            self.ema21,
            self.resistance,
            self.support,
        ];
        fields.iter().all(|v| v.is_finite()) && self.ltp > 0.0 && self.relative_volume >= 0.0
    }
}

/// One put-call-ratio observation within a trading session.
///
/// `time` is kept as the upstream string ("HH:MM" or "HH:MM:SS"); points
/// whose time does not parse are skipped by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcrPoint {
    pub time: String,
    pub pcr: f64,
}

impl PcrPoint {
    pub fn new(time: impl Into<String>, pcr: f64) -> Self {
        Self {
            time: time.into(),
            pcr,
        }
    }
}

/// Daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

// ============================================================================
// Tests
// ============================================================================
