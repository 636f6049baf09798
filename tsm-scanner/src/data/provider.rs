//! Data source abstractions consumed by the scanning engine.
//!
//! The engine never talks to HTTP directly; it goes through these traits so
//! that tests can inject mock sources and a real deployment can swap vendors.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use super::{PcrPoint, Symbol, TechnicalSnapshot};

// ============================================================================
// Fetch Error
// ============================================================================

/// Per-symbol fetch failure. Always recovered by the batch scheduler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Connection failed, DNS, TLS, reset
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status
    #[error("HTTP {status} from {endpoint}")]
    Http { status: u16, endpoint: String },

    /// Response body did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// The fetch did not settle within its deadline
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream rejected the request for rate reasons
    #[error("Rate limited by {0}")]
    RateLimited(String),

    /// No data for this symbol
    #[error("Data not available: {0}")]
    NotAvailable(String),

    /// The per-symbol task itself failed (panic or abort)
    #[error("Task failed: {0}")]
    Task(String),
}

impl FetchError {
    /// Whether a later attempt could plausibly succeed.
    ///
    /// Scans never retry within a run; this only feeds logging and callers
    /// deciding whether to rerun.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Map a transport error from `reqwest`.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                endpoint: err.url().map(|u| u.path().to_string()).unwrap_or_default(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }

    /// Map a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode, endpoint: &str, source: &str) -> Self {
        match status.as_u16() {
            404 => Self::NotAvailable(format!("{} returned 404 for {}", source, endpoint)),
            429 => Self::RateLimited(source.to_string()),
            code => Self::Http {
                status: code,
                endpoint: endpoint.to_string(),
            },
        }
    }
}

// ============================================================================
// Source Traits
// ============================================================================

/// Supplies the set of symbols to scan.
#[async_trait]
pub trait SymbolUniverse: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Current tradable symbols, in scan order.
    async fn symbols(&self) -> Result<Vec<Symbol>, FetchError>;
}

/// Supplies a technical snapshot per symbol for the intraday scanner.
#[async_trait]
pub trait TechnicalSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_snapshot(&self, symbol: &Symbol) -> Result<TechnicalSnapshot, FetchError>;
}

/// Supplies the intraday put-call-ratio series per symbol.
///
/// An unreachable or malformed upstream is an error, never an empty series;
/// an empty `Ok` means the session genuinely has no points yet.
#[async_trait]
pub trait PcrSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_pcr_series(&self, symbol: &Symbol) -> Result<Vec<PcrPoint>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(FetchError::Network("reset".into()).is_recoverable());
        assert!(FetchError::Timeout(Duration::from_secs(8)).is_recoverable());
        assert!(FetchError::Http {
            status: 503,
            endpoint: "/x".into()
        }
        .is_recoverable());
        assert!(!FetchError::Http {
            status: 400,
            endpoint: "/x".into()
        }
        .is_recoverable());
        assert!(!FetchError::Parse("bad".into()).is_recoverable());
    }

    #[test]
    fn test_from_status() {
        let err = FetchError::from_status(reqwest::StatusCode::NOT_FOUND, "/chart/X", "chart");
        assert!(matches!(err, FetchError::NotAvailable(_)));

        let err = FetchError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "/pcr", "pcr");
        assert_eq!(err, FetchError::RateLimited("pcr".into()));

        let err = FetchError::from_status(reqwest::StatusCode::BAD_GATEWAY, "/pcr", "pcr");
        assert_eq!(err.to_string(), "HTTP 502 from /pcr");
    }
}
