//! TSM Common - Shared configuration, errors, and logging for the
//! TradeSmartMoney signal services.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration and request validation
//! - Error types and handling utilities
//! - Logging setup and run/trace ID helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{
    CacheConfig, Config, MarketDataConfig, ObservabilityConfig, ScannerConfig, ServerConfig,
    StormConfig, StormWindowJobConfig, UniverseConfig,
};
pub use error::{Error, Result, ResultExt};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
