//! Error types shared by the signal services.

use thiserror::Error;

use crate::validation::ValidationError;

/// Result type alias using the common error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for configuration and persistence failures.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_is_transparent() {
        let err: Error = ValidationError::MissingField {
            field: "startTime".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Missing required field: startTime");
    }

    #[test]
    fn test_error_with_context() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config.json");
        let with_ctx = Error::from(io).with_context("loading config");
        assert!(matches!(with_ctx, Error::WithContext { .. }));
        assert_eq!(with_ctx.to_string(), "loading config: IO error: config.json");
    }

    #[test]
    fn test_result_ext_wraps_foreign_errors() {
        let parsed: std::result::Result<u32, serde_json::Error> = serde_json::from_str("nope");
        let err = parsed.context("reading weights").unwrap_err();
        assert!(err.to_string().starts_with("reading weights: JSON error"));
    }
}
