//! Symbol universe sources.
//!
//! The primary source is the `fno_symbols` table behind Supabase's PostgREST
//! API. When it is unconfigured, fails, or comes back empty, a configured
//! static list is used so the scan still runs in degraded mode.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tsm_common::UniverseConfig;

use super::provider::{FetchError, SymbolUniverse};
use super::Symbol;

/// Normalise raw identifiers: trim, uppercase, drop blanks and duplicates,
/// keeping first-seen order.
pub fn normalize_symbols<I, S>(raw: I) -> Vec<Symbol>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(Symbol::new)
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

// ============================================================================
// Static Universe
// ============================================================================

/// Fixed symbol list.
#[derive(Debug, Clone)]
pub struct StaticUniverse {
    symbols: Vec<Symbol>,
}

impl StaticUniverse {
    pub fn new<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            symbols: normalize_symbols(raw),
        }
    }
}

#[async_trait]
impl SymbolUniverse for StaticUniverse {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn symbols(&self) -> Result<Vec<Symbol>, FetchError> {
        Ok(self.symbols.clone())
    }
}

// ============================================================================
// Supabase Universe
// ============================================================================

#[derive(Debug, Deserialize)]
struct SymbolRow {
    symbol_name: Option<String>,
}

/// Active F&O symbols from a Supabase table via PostgREST.
pub struct SupabaseUniverse {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
    timeout: Duration,
}

impl SupabaseUniverse {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            table: table.into(),
            timeout: Duration::from_secs(8),
        }
    }

    /// Build from configuration. Returns `None` when URL or key is missing.
    pub fn from_config(client: reqwest::Client, config: &UniverseConfig) -> Option<Self> {
        if !config.is_supabase_configured() {
            return None;
        }
        let url = config.supabase_url.as_deref()?;
        let key = config.supabase_key.as_deref()?;
        Some(Self::new(client, url, key, config.table.clone()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SymbolUniverse for SupabaseUniverse {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn symbols(&self) -> Result<Vec<Symbol>, FetchError> {
        let endpoint = format!("{}/rest/v1/{}", self.base_url, self.table);

        let response = self
            .client
            .get(&endpoint)
            .query(&[
                ("select", "symbol_name"),
                ("is_active", "eq.true"),
                ("order", "symbol_name"),
            ])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status, &endpoint, self.name()));
        }

        let rows: Vec<SymbolRow> = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(format!("symbol rows: {}", e)))?;

        let symbols = normalize_symbols(rows.into_iter().filter_map(|r| r.symbol_name));
        debug!(count = symbols.len(), table = %self.table, "Fetched symbol universe");
        Ok(symbols)
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Which list a scan ended up running against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniverseSource {
    Primary,
    Fallback,
}

/// Universe resolved for one scan.
#[derive(Debug, Clone)]
pub struct ResolvedUniverse {
    pub symbols: Vec<Symbol>,
    pub source: UniverseSource,
}

/// Primary source with a static fallback.
#[derive(Clone)]
pub struct UniverseResolver {
    primary: Option<Arc<dyn SymbolUniverse>>,
    fallback: Vec<Symbol>,
}

impl UniverseResolver {
    pub fn new(primary: Option<Arc<dyn SymbolUniverse>>, fallback: Vec<Symbol>) -> Self {
        Self { primary, fallback }
    }

    /// Fallback list only.
    pub fn fallback_only(fallback: Vec<Symbol>) -> Self {
        Self::new(None, fallback)
    }

    pub fn from_config(client: reqwest::Client, config: &UniverseConfig, timeout: Duration) -> Self {
        let primary = SupabaseUniverse::from_config(client, config)
            .map(|u| Arc::new(u.with_timeout(timeout)) as Arc<dyn SymbolUniverse>);
        Self::new(primary, normalize_symbols(&config.fallback_symbols))
    }

    /// Resolve the symbols to scan. Never fails; may return an empty list when
    /// the fallback list is itself empty.
    pub async fn resolve(&self) -> ResolvedUniverse {
        let Some(primary) = &self.primary else {
            info!(
                count = self.fallback.len(),
                "Symbol universe not configured, using fallback symbols"
            );
            return self.fallback();
        };

        match primary.symbols().await {
            Ok(symbols) if !symbols.is_empty() => ResolvedUniverse {
                symbols,
                source: UniverseSource::Primary,
            },
            Ok(_) => {
                warn!(
                    source = primary.name(),
                    "Symbol universe returned no symbols, using fallback"
                );
                self.fallback()
            }
            Err(e) => {
                warn!(
                    source = primary.name(),
                    error = %e,
                    "Symbol universe fetch failed, using fallback"
                );
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> ResolvedUniverse {
        ResolvedUniverse {
            symbols: self.fallback.clone(),
            source: UniverseSource::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingUniverse {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SymbolUniverse for FailingUniverse {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn symbols(&self) -> Result<Vec<Symbol>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Network("connection refused".into()))
        }
    }

    #[test]
    fn test_normalize_dedupes_in_order() {
        let symbols = normalize_symbols(["tcs", " INFY", "TCS", "", "sbin"]);
        let names: Vec<_> = symbols.iter().map(Symbol::as_str).collect();
        assert_eq!(names, vec!["TCS", "INFY", "SBIN"]);
    }

    #[tokio::test]
    async fn test_resolver_without_primary_uses_fallback() {
        let resolver = UniverseResolver::fallback_only(normalize_symbols(["NIFTY"]));
        let resolved = resolver.resolve().await;
        assert_eq!(resolved.source, UniverseSource::Fallback);
        assert_eq!(resolved.symbols.len(), 1);
    }

    #[tokio::test]
    async fn test_resolver_falls_back_on_error() {
        let primary = Arc::new(FailingUniverse {
            calls: AtomicUsize::new(0),
        });
        let resolver = UniverseResolver::new(
            Some(primary.clone()),
            normalize_symbols(["NIFTY", "BANKNIFTY"]),
        );

        let resolved = resolver.resolve().await;
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolved.source, UniverseSource::Fallback);
        assert_eq!(resolved.symbols.len(), 2);
    }

    #[tokio::test]
    async fn test_resolver_falls_back_on_empty_primary() {
        let primary = Arc::new(StaticUniverse::new(Vec::<String>::new()));
        let resolver = UniverseResolver::new(Some(primary), normalize_symbols(["TCS"]));
        assert_eq!(resolver.resolve().await.source, UniverseSource::Fallback);
    }

    #[tokio::test]
    async fn test_resolver_prefers_primary() {
        let primary = Arc::new(StaticUniverse::new(["RELIANCE", "ITC"]));
        let resolver = UniverseResolver::new(Some(primary), normalize_symbols(["TCS"]));
        let resolved = resolver.resolve().await;
        assert_eq!(resolved.source, UniverseSource::Primary);
        assert_eq!(resolved.symbols[1].as_str(), "ITC");
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = UniverseConfig::default();
        assert!(SupabaseUniverse::from_config(reqwest::Client::new(), &config).is_none());
    }
}
