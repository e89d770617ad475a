//! Configuration loading.
//!
//! Read from `~/.spark/config.json`. Every section has defaults, so a missing
//! file or a partial file is fine. Environment variables override the file:
//!
//! | Variable                 | Field               |
//! |--------------------------|---------------------|
//! | `SPARK_PROVIDER_API_KEY` | `provider.api_key`  |
//! | `SPARK_PROVIDER_MODEL`   | `provider.model`    |
//! | `SPARK_CACHE_TTL_MS`     | `cache.ttl_ms`      |
//! | `SPARK_CACHE_PATH`       | `cache.path`        |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{FileBackend, DEFAULT_TTL_MS};
use crate::error::{Result, SparkError};
use crate::providers::gemini::DEFAULT_GEMINI_MODEL;
use crate::search::ChunkPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
    pub stream: StreamConfig,
}

/// Remote model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Gemini API key. Falls back to `GEMINI_API_KEY` / `GOOGLE_API_KEY`.
    pub api_key: Option<String>,
    pub model: String,
    /// Alternative API root.
    pub base_url: Option<String>,
    /// Ground answers with web search.
    pub web_search: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: None,
            web_search: true,
        }
    }
}

/// Answer cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_ms: u64,
    /// Cache file. Defaults to `~/.spark/cache/spark_cache_v3.json`.
    pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
            path: None,
        }
    }
}

impl CacheConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(FileBackend::default_path)
    }
}

/// Typewriter pacing for cached and live answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub cached_words_per_chunk: usize,
    pub cached_delay_ms: u64,
    pub live_words_per_chunk: usize,
    pub live_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            cached_words_per_chunk: 12,
            cached_delay_ms: 15,
            live_words_per_chunk: 10,
            live_delay_ms: 20,
        }
    }
}

impl StreamConfig {
    pub fn cached_policy(&self) -> ChunkPolicy {
        ChunkPolicy::new(
            self.cached_words_per_chunk,
            Duration::from_millis(self.cached_delay_ms),
        )
    }

    pub fn live_policy(&self) -> ChunkPolicy {
        ChunkPolicy::new(
            self.live_words_per_chunk,
            Duration::from_millis(self.live_delay_ms),
        )
    }
}

impl Config {
    /// `~/.spark`.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".spark")
    }

    /// `~/.spark/config.json`.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from the default path and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(&Self::path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load a config file. A missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                SparkError::Config(format!("invalid config file {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply `SPARK_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("SPARK_PROVIDER_API_KEY").filter(|v| !v.is_empty()) {
            self.provider.api_key = Some(key);
        }
        if let Some(model) = lookup("SPARK_PROVIDER_MODEL").filter(|v| !v.is_empty()) {
            self.provider.model = model;
        }
        if let Some(raw) = lookup("SPARK_CACHE_TTL_MS") {
            match raw.parse() {
                Ok(ttl) => self.cache.ttl_ms = ttl,
                Err(_) => warn!(value = %raw, "Ignoring invalid SPARK_CACHE_TTL_MS"),
            }
        }
        if let Some(path) = lookup("SPARK_CACHE_PATH").filter(|v| !v.is_empty()) {
            self.cache.path = Some(PathBuf::from(path));
        }
    }

    /// Copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.provider.api_key.is_some() {
            copy.provider.api_key = Some("[REDACTED]".to_string());
        }
        copy
    }
}
