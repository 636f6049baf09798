//! Configuration management for the signal services.
//!
//! All services share one configuration file at `~/.tradesmartmoney/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (TSM_* prefix, Supabase variables)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `TSM_SCANNER_HOST` → server.host
//! - `TSM_SCANNER_PORT` → server.port
//! - `TSM_LOG_LEVEL` → observability.log_level
//! - `TSM_LOG_FORMAT` → observability.log_format
//! - `SUPABASE_URL` → universe.supabase_url
//! - `SUPABASE_SERVICE_ROLE_KEY` → universe.supabase_key

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ResultExt};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".tradesmartmoney"),
        |dirs| dirs.home_dir().join(".tradesmartmoney"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration shared by the signal services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Where the F&O symbol universe comes from
    #[serde(default)]
    pub universe: UniverseConfig,

    /// External market data endpoints and limits
    #[serde(default)]
    pub market_data: MarketDataConfig,

    /// Intraday scanner batching and request defaults
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// PCR storm detector batching, defaults and the scheduled window job
    #[serde(default)]
    pub storm: StormConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .context(format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration and apply environment overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("TSM_SCANNER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("TSM_SCANNER_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(level) = lookup("TSM_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("TSM_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(url) = lookup("SUPABASE_URL").filter(|u| !u.is_empty()) {
            self.universe.supabase_url = Some(url);
        }
        if let Some(key) = lookup("SUPABASE_SERVICE_ROLE_KEY").filter(|k| !k.is_empty()) {
            self.universe.supabase_key = Some(key);
        }
    }

    /// Serialize the configuration and write it to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(Error::from)
    }
}

// ============================================================================
// Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound for a single HTTP request, including a full scan
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4480
}

fn default_request_timeout_secs() -> u64 {
    300
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets clamped to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Symbol Universe
// ============================================================================

/// Symbol universe source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Supabase project URL (e.g. `https://xyz.supabase.co`)
    #[serde(default)]
    pub supabase_url: Option<String>,

    /// Supabase service role key
    #[serde(default)]
    pub supabase_key: Option<String>,

    /// Table holding the active F&O symbols
    #[serde(default = "default_symbol_table")]
    pub table: String,

    /// Symbols scanned when the table cannot be read
    #[serde(default = "default_fallback_symbols")]
    pub fallback_symbols: Vec<String>,
}

impl UniverseConfig {
    /// Whether both Supabase URL and key are present.
    pub fn is_supabase_configured(&self) -> bool {
        matches!(
            (&self.supabase_url, &self.supabase_key),
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty()
        )
    }
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_key: None,
            table: default_symbol_table(),
            fallback_symbols: default_fallback_symbols(),
        }
    }
}

fn default_symbol_table() -> String {
    "fno_symbols".to_string()
}

fn default_fallback_symbols() -> Vec<String> {
    ["NIFTY", "BANKNIFTY", "RELIANCE", "TCS", "HDFCBANK"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ============================================================================
// Market Data
// ============================================================================

/// External market data endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    /// Base URL of the daily chart API used for technical snapshots
    #[serde(default = "default_chart_base_url")]
    pub chart_base_url: String,

    /// Chart history range requested per symbol (e.g. "6mo")
    #[serde(default = "default_chart_range")]
    pub chart_range: String,

    /// Exchange suffix appended to equity symbols for the chart API
    #[serde(default = "default_exchange_suffix")]
    pub exchange_suffix: String,

    /// Base URL of the PCR series API
    #[serde(default = "default_pcr_base_url")]
    pub pcr_base_url: String,

    /// Per-fetch timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Chart API rate limit (requests per minute)
    #[serde(default = "default_chart_rpm")]
    pub chart_requests_per_minute: u32,

    /// PCR API rate limit (requests per minute)
    #[serde(default = "default_pcr_rpm")]
    pub pcr_requests_per_minute: u32,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            chart_base_url: default_chart_base_url(),
            chart_range: default_chart_range(),
            exchange_suffix: default_exchange_suffix(),
            pcr_base_url: default_pcr_base_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            chart_requests_per_minute: default_chart_rpm(),
            pcr_requests_per_minute: default_pcr_rpm(),
        }
    }
}

fn default_chart_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_chart_range() -> String {
    "6mo".to_string()
}

fn default_exchange_suffix() -> String {
    ".NS".to_string()
}

fn default_pcr_base_url() -> String {
    "https://services.niftytrader.in".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    8
}

fn default_chart_rpm() -> u32 {
    120
}

fn default_pcr_rpm() -> u32 {
    300
}

// ============================================================================
// Scanner
// ============================================================================

/// Intraday scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Symbols fetched and scored concurrently per batch
    #[serde(default = "default_scanner_batch_size")]
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    #[serde(default = "default_scanner_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,

    #[serde(default = "default_min_score")]
    pub default_min_score: u32,

    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_scanner_batch_size(),
            inter_batch_delay_ms: default_scanner_batch_delay_ms(),
            default_min_score: default_min_score(),
            default_max_results: default_max_results(),
        }
    }
}

fn default_scanner_batch_size() -> usize {
    10
}

fn default_scanner_batch_delay_ms() -> u64 {
    500
}

fn default_min_score() -> u32 {
    70
}

fn default_max_results() -> usize {
    20
}

// ============================================================================
// Storm Detector
// ============================================================================

/// PCR storm detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StormConfig {
    #[serde(default = "default_storm_batch_size")]
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    #[serde(default = "default_storm_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,

    /// Default minimum PCR change (%) when a request omits it
    #[serde(default = "default_threshold_percent")]
    pub default_threshold_percent: f64,

    /// Series whose first in-window PCR is at or above this value are skipped
    #[serde(default = "default_entry_pcr_ceiling")]
    pub entry_pcr_ceiling: f64,

    #[serde(default)]
    pub window_job: StormWindowJobConfig,
}

impl Default for StormConfig {
    fn default() -> Self {
        Self {
            batch_size: default_storm_batch_size(),
            inter_batch_delay_ms: default_storm_batch_delay_ms(),
            default_threshold_percent: default_threshold_percent(),
            entry_pcr_ceiling: default_entry_pcr_ceiling(),
            window_job: StormWindowJobConfig::default(),
        }
    }
}

fn default_storm_batch_size() -> usize {
    5
}

fn default_storm_batch_delay_ms() -> u64 {
    200
}

fn default_threshold_percent() -> f64 {
    10.0
}

fn default_entry_pcr_ceiling() -> f64 {
    0.49
}

/// Scheduled storm scan that only runs inside the opening session window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StormWindowJobConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Session window start (HH:MM, exchange local time)
    #[serde(default = "default_window_start")]
    pub window_start: String,

    /// Session window end (HH:MM, exchange local time)
    #[serde(default = "default_window_end")]
    pub window_end: String,

    /// Seconds between scans while inside the window
    #[serde(default = "default_job_interval_secs")]
    pub interval_secs: u64,

    /// Exchange offset from UTC in minutes (IST = 330)
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

impl Default for StormWindowJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_start: default_window_start(),
            window_end: default_window_end(),
            interval_secs: default_job_interval_secs(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

fn default_window_start() -> String {
    "09:25".to_string()
}

fn default_window_end() -> String {
    "10:25".to_string()
}

fn default_job_interval_secs() -> u64 {
    300
}

fn default_utc_offset_minutes() -> i32 {
    330
}

// ============================================================================
// Cache
// ============================================================================

/// Snapshot cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Snapshot time-to-live in seconds
    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_ttl_secs: default_snapshot_ttl_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_snapshot_ttl_secs() -> i64 {
    300 // matches the upstream refresh interval
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 4480);
        assert_eq!(config.scanner.batch_size, 10);
        assert_eq!(config.scanner.inter_batch_delay_ms, 500);
        assert_eq!(config.storm.window_job.window_start, "09:25");
        assert!((config.storm.entry_pcr_ceiling - 0.49).abs() < f64::EPSILON);
        assert_eq!(config.universe.fallback_symbols.len(), 5);
        assert!(!config.universe.is_supabase_configured());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"scanner": {"batch_size": 25}, "observability": {"level": "debug"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.scanner.batch_size, 25);
        assert_eq!(config.scanner.default_min_score, 70);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.storm.batch_size, 5);
    }

    #[test]
    fn test_load_from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.server.port = 9001;
        config.universe.fallback_symbols = vec!["SBIN".into()];
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.server.port, 9001);
        assert_eq!(loaded.universe.fallback_symbols, vec!["SBIN".to_string()]);
    }

    #[test]
    fn test_load_from_invalid_json_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::WithContext { .. }));
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TSM_SCANNER_PORT", "5000"),
            ("TSM_LOG_FORMAT", "json"),
            ("SUPABASE_URL", "https://example.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.observability.log_format, "json");
        assert!(config.universe.is_supabase_configured());
    }

    #[test]
    fn test_invalid_port_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "TSM_SCANNER_PORT").then(|| "abc".to_string()));
        assert_eq!(config.server.port, 4480);
    }
}
