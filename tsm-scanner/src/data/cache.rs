//! Per-symbol snapshot cache with TTL.
//!
//! The cache is a plain value: the caller creates it, hands it to a scan
//! through `ScanContext`, and decides how long it lives. Two scans with two
//! caches never see each other's entries.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::Symbol;

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Snapshot cache keyed by symbol.
#[derive(Debug)]
pub struct SnapshotCache<T> {
    entries: RwLock<HashMap<Symbol, CacheEntry<T>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Clone> SnapshotCache<T> {
    /// Create with a TTL in seconds.
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs.max(0)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a cached value if not expired.
    pub fn get(&self, symbol: &Symbol) -> Option<T> {
        self.get_at(symbol, Utc::now())
    }

    /// Get a cached value as of `now`.
    pub fn get_at(&self, symbol: &Symbol, now: DateTime<Utc>) -> Option<T> {
        let found = self.entries.read().ok().and_then(|cache| {
            cache
                .get(symbol)
                .filter(|entry| !entry.is_expired_at(now))
                .map(|entry| entry.data.clone())
        });

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Cache a value.
    pub fn insert(&self, symbol: Symbol, data: T) {
        self.insert_at(symbol, data, Utc::now());
    }

    /// Cache a value as if stored at `now`.
    pub fn insert_at(&self, symbol: Symbol, data: T, now: DateTime<Utc>) {
        let entry = CacheEntry {
            data,
            expires_at: now + self.ttl,
        };
        if let Ok(mut cache) = self.entries.write() {
            cache.insert(symbol, entry);
        }
    }

    /// Drop one symbol.
    pub fn invalidate(&self, symbol: &Symbol) {
        if let Ok(mut cache) = self.entries.write() {
            cache.remove(symbol);
        }
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn clear_expired(&self) -> usize {
        let now = Utc::now();
        match self.entries.write() {
            Ok(mut cache) => {
                let before = cache.len();
                cache.retain(|_, entry| !entry.is_expired_at(now));
                before - cache.len()
            }
            Err(_) => 0,
        }
    }

    /// Clear all entries and reset statistics.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.entries.write() {
            cache.clear();
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let (total, expired) = self
            .entries
            .read()
            .map(|cache| {
                let expired = cache.values().filter(|e| e.is_expired_at(now)).count();
                (cache.len(), expired)
            })
            .unwrap_or((0, 0));

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        CacheStats {
            total,
            expired,
            active: total - expired,
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub expired: usize,
    pub active: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}
