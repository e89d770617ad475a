//! Answer cache with TTL expiry and whole-map JSON persistence.
//!
//! The persisted document is `{ "<fingerprint>": CacheEntry, ... }`. Expired
//! entries are dropped once, when the cache is constructed; reads only skip
//! them. There is no size bound and no LRU: entries leave the map by age only.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::backend::CacheBackend;

/// Default entry lifetime: one hour.
pub const DEFAULT_TTL_MS: u64 = 3_600_000;

/// Engine label reported for answers replayed from the cache.
pub const CACHED_ENGINE: &str = "Local Cache";

/// A citation attached to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

/// A single cached answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Full answer text.
    pub text: String,
    /// Citations. The live path never populates these today.
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Follow-up queries, attached after the answer finished streaming.
    #[serde(default)]
    pub related_queries: Vec<String>,
    /// Creation time in epoch milliseconds.
    pub timestamp: u64,
    /// Label of the backend that produced the text.
    pub engine: String,
}

impl CacheEntry {
    /// New entry stamped with the current time, no sources or related queries.
    pub fn new(text: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
            related_queries: Vec::new(),
            timestamp: now_millis(),
            engine: engine.into(),
        }
    }

    /// Age in milliseconds at `now_ms`. Future timestamps count as age zero.
    pub fn age_at(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp)
    }

    /// Whether a read at `now_ms` may serve this entry.
    pub fn is_fresh_at(&self, now_ms: u64, ttl_ms: u64) -> bool {
        self.age_at(now_ms) < ttl_ms
    }
}

/// Answer cache keyed by query fingerprint.
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    backend: Box<dyn CacheBackend>,
    ttl_ms: u64,
}

impl ResponseCache {
    /// Load the cache from `backend` and drop expired entries.
    ///
    /// Never fails: an absent, unreadable or corrupt document yields an empty
    /// cache. The sweep is not written back until the next `put`.
    pub fn new(backend: Box<dyn CacheBackend>, ttl_ms: u64) -> Self {
        let entries = Self::load(backend.as_ref());
        let mut cache = Self {
            entries,
            backend,
            ttl_ms,
        };
        cache.sweep_expired();
        cache
    }

    /// Cache with the default one hour TTL.
    pub fn with_default_ttl(backend: Box<dyn CacheBackend>) -> Self {
        Self::new(backend, DEFAULT_TTL_MS)
    }

    /// Remove every entry older than the TTL. Returns how many were removed.
    pub fn sweep_expired(&mut self) -> usize {
        self.sweep_expired_at(now_millis())
    }

    pub fn sweep_expired_at(&mut self, now_ms: u64) -> usize {
        let ttl = self.ttl_ms;
        let before = self.entries.len();
        self.entries.retain(|_, e| e.age_at(now_ms) <= ttl);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "Swept expired cache entries");
        }
        removed
    }

    /// Look up a fresh entry. Stale entries read as absent but stay in the map.
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.get_at(key, now_millis())
    }

    pub fn get_at(&self, key: &str, now_ms: u64) -> Option<&CacheEntry> {
        self.entries
            .get(key)
            .filter(|e| e.is_fresh_at(now_ms, self.ttl_ms))
    }

    /// Insert or overwrite an entry, then persist the whole map.
    pub fn put(&mut self, key: impl Into<String>, entry: CacheEntry) {
        let key = key.into();
        debug!(key = %key, engine = %entry.engine, "Caching answer");
        self.entries.insert(key, entry);
        self.persist();
    }

    /// Replace the related queries of an existing entry and persist.
    ///
    /// Returns `false` without touching storage when the key is absent.
    pub fn attach_related(&mut self, key: &str, related: Vec<String>) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.related_queries = related;
                self.persist();
                true
            }
            None => false,
        }
    }

    /// Aggregate statistics about the cache.
    pub fn stats(&self) -> CacheStats {
        let now = now_millis();
        CacheStats {
            total_entries: self.entries.len(),
            fresh_entries: self
                .entries
                .values()
                .filter(|e| e.is_fresh_at(now, self.ttl_ms))
                .count(),
            total_bytes: self.entries.values().map(|e| e.text.len()).sum(),
            oldest_timestamp: self.entries.values().map(|e| e.timestamp).min(),
            newest_timestamp: self.entries.values().map(|e| e.timestamp).max(),
        }
    }

    /// Number of entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Where the cache is persisted.
    pub fn location(&self) -> String {
        self.backend.describe()
    }

    // -- private helpers ---------------------------------------------------

    fn load(backend: &dyn CacheBackend) -> HashMap<String, CacheEntry> {
        match backend.read() {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Response cache is corrupt, starting empty: {}", e);
                    HashMap::new()
                }
            },
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("Failed to read response cache, starting empty: {}", e);
                HashMap::new()
            }
        }
    }

    fn persist(&self) {
        let data = match serde_json::to_string(&self.entries) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to serialize response cache: {}", e);
                return;
            }
        };
        if let Err(e) = self.backend.write(&data) {
            warn!(
                location = %self.backend.describe(),
                "Failed to persist response cache, continuing in memory: {}", e
            );
        }
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries in the map, including stale ones not yet swept.
    pub total_entries: usize,
    /// Entries a read would serve right now.
    pub fresh_entries: usize,
    /// Sum of answer text lengths in bytes.
    pub total_bytes: usize,
    /// Epoch milliseconds of the oldest and newest entries.
    pub oldest_timestamp: Option<u64>,
    pub newest_timestamp: Option<u64>,
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
