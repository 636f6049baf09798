//! Validation for configuration sections and request parameters.
//!
//! The same [`ValidationError`] type is used for a bad config file and for a
//! bad scan request, so callers can tell "rejected before any work" apart
//! from a runtime failure.

use thiserror::Error;

use crate::config::{
    CacheConfig, Config, MarketDataConfig, ObservabilityConfig, ScannerConfig, ServerConfig,
    StormConfig, UniverseConfig,
};

/// Validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Shorthand for [`ValidationError::InvalidValue`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ValidationError::MissingField`].
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Collapse a list of errors into one.
    pub fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable sections.
pub trait Validate {
    /// Validate this section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let sections: [&dyn Validate; 7] = [
            &self.server,
            &self.observability,
            &self.universe,
            &self.market_data,
            &self.scanner,
            &self.storm,
            &self.cache,
        ];

        let errors = sections
            .iter()
            .filter_map(|section| section.validate().err())
            .collect();

        ValidationError::collect(errors)
    }

    /// Load (with environment overrides) and validate configuration.
    pub fn load_and_validate() -> crate::error::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate()?;
        Ok(config)
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::invalid("server.port", "must be between 1 and 65535"));
        }
        if self.host.trim().is_empty() {
            return Err(ValidationError::missing("server.host"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::invalid(
                "server.request_timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        const FORMATS: &[&str] = &["json", "pretty"];

        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::invalid(
                "observability.log_level",
                format!("must be one of {:?}", LEVELS),
            ));
        }
        if !FORMATS.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::invalid(
                "observability.log_format",
                format!("must be one of {:?}", FORMATS),
            ));
        }
        Ok(())
    }
}

impl Validate for UniverseConfig {
    fn validate(&self) -> ValidationResult<()> {
        // The fallback list is what keeps a scan alive when the table is unreachable.
        if self.fallback_symbols.iter().all(|s| s.trim().is_empty()) {
            return Err(ValidationError::invalid(
                "universe.fallback_symbols",
                "must contain at least one symbol",
            ));
        }
        if self.supabase_url.is_some() != self.supabase_key.is_some() {
            return Err(ValidationError::Conflict {
                reason: "universe.supabase_url and universe.supabase_key must be set together"
                    .to_string(),
            });
        }
        if self.table.trim().is_empty() {
            return Err(ValidationError::missing("universe.table"));
        }
        Ok(())
    }
}

impl Validate for MarketDataConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        for (field, url) in [
            ("market_data.chart_base_url", &self.chart_base_url),
            ("market_data.pcr_base_url", &self.pcr_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ValidationError::invalid(field, "must be an http(s) URL"));
            }
        }
        if self.fetch_timeout_secs == 0 {
            errors.push(ValidationError::invalid(
                "market_data.fetch_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.chart_requests_per_minute == 0 || self.pcr_requests_per_minute == 0 {
            errors.push(ValidationError::invalid(
                "market_data.*_requests_per_minute",
                "must be greater than 0",
            ));
        }
        ValidationError::collect(errors)
    }
}

impl Validate for ScannerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.batch_size == 0 {
            return Err(ValidationError::invalid("scanner.batch_size", "must be greater than 0"));
        }
        if self.default_max_results == 0 {
            return Err(ValidationError::invalid(
                "scanner.default_max_results",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Validate for StormConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        if self.batch_size == 0 {
            errors.push(ValidationError::invalid("storm.batch_size", "must be greater than 0"));
        }
        if !(self.default_threshold_percent.is_finite() && self.default_threshold_percent > 0.0) {
            errors.push(ValidationError::invalid(
                "storm.default_threshold_percent",
                "must be a positive number",
            ));
        }
        if !(self.entry_pcr_ceiling.is_finite() && self.entry_pcr_ceiling > 0.0) {
            errors.push(ValidationError::invalid(
                "storm.entry_pcr_ceiling",
                "must be a positive number",
            ));
        }
        let job = &self.window_job;
        if job.enabled && job.interval_secs == 0 {
            errors.push(ValidationError::invalid(
                "storm.window_job.interval_secs",
                "must be greater than 0",
            ));
        }
        if !(-720..=840).contains(&job.utc_offset_minutes) {
            errors.push(ValidationError::invalid(
                "storm.window_job.utc_offset_minutes",
                "must be between -720 and 840",
            ));
        }
        ValidationError::collect(errors)
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.enabled && self.snapshot_ttl_secs <= 0 {
            return Err(ValidationError::invalid(
                "cache.snapshot_ttl_secs",
                "must be greater than 0 when the cache is enabled",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = Config::default();
        config.scanner.batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "scanner.batch_size"));
    }

    #[test]
    fn test_multiple_errors_collected() {
        let mut config = Config::default();
        config.scanner.batch_size = 0;
        config.storm.batch_size = 0;
        config.cache.snapshot_ttl_secs = 0;
        match config.validate().unwrap_err() {
            ValidationError::Multiple(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test]
    fn test_supabase_half_configured_conflicts() {
        let mut config = UniverseConfig::default();
        config.supabase_url = Some("https://x.supabase.co".into());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::Conflict { .. })
        ));
    }

    #[test]
    fn test_empty_fallback_rejected() {
        let mut config = UniverseConfig::default();
        config.fallback_symbols = vec![" ".into()];
        assert!(config.validate().is_err());
    }

    #[test_case("info", "pretty", true ; "defaults")]
    #[test_case("DEBUG", "json", true ; "case insensitive")]
    #[test_case("verbose", "pretty", false ; "unknown level")]
    #[test_case("info", "xml", false ; "unknown format")]
    fn test_observability_validation(level: &str, format: &str, ok: bool) {
        let config = ObservabilityConfig {
            log_level: level.into(),
            log_format: format.into(),
            excluded_targets: Vec::new(),
        };
        assert_eq!(config.validate().is_ok(), ok);
    }

    #[test]
    fn test_market_data_rejects_non_http_url() {
        let mut config = MarketDataConfig::default();
        config.pcr_base_url = "ftp://example.com".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_config_surfaces_as_validation_error() {
        let mut config = Config::default();
        config.storm.batch_size = 0;
        let err: crate::error::Error = config.validate().unwrap_err().into();
        assert!(matches!(err, crate::error::Error::Validation(_)));
        assert!(err.to_string().contains("storm.batch_size"));
    }
}
