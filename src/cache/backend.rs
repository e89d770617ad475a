//! Persistence backends for the response cache.
//!
//! The cache serializes its whole mapping to one string and hands it to a
//! [`CacheBackend`]. [`FileBackend`] keeps it in a single JSON file;
//! [`MemoryBackend`] keeps it in memory and is what the tests use.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Result, SparkError};

/// File name of the persisted cache. Bumping the version orphans old caches.
pub const CACHE_FILE_NAME: &str = "spark_cache_v3.json";

/// A single string slot holding the serialized cache.
pub trait CacheBackend: Send + Sync {
    /// Return the stored document, or `None` if nothing was ever written.
    fn read(&self) -> Result<Option<String>>;

    /// Replace the stored document.
    fn write(&self, data: &str) -> Result<()>;

    /// Short human-readable description (used in logs and `cache stats`).
    fn describe(&self) -> String;
}

// ============================================================================
// FileBackend
// ============================================================================

/// Stores the cache document in one JSON file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.spark/cache/spark_cache_v3.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".spark")
            .join("cache")
            .join(CACHE_FILE_NAME)
    }
}

impl CacheBackend for FileBackend {
    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, data: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically via temp file
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory backend. Clones share the same slot, so a test can keep a
/// handle and inspect what the cache persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    slot: Arc<Mutex<Option<String>>>,
    writes: Arc<AtomicUsize>,
    fail_writes: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `data` already stored, as if a previous session wrote it.
    pub fn with_contents(data: impl Into<String>) -> Self {
        let backend = Self::default();
        *backend.slot.lock().expect("memory backend lock poisoned") = Some(data.into());
        backend
    }

    /// A backend whose writes always fail (storage full or unavailable).
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// Currently stored document.
    pub fn contents(&self) -> Option<String> {
        self.slot
            .lock()
            .expect("memory backend lock poisoned")
            .clone()
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl CacheBackend for MemoryBackend {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.contents())
    }

    fn write(&self, data: &str) -> Result<()> {
        if self.fail_writes {
            return Err(SparkError::Io(std::io::Error::new(
                ErrorKind::Other,
                "memory backend rejects writes",
            )));
        }
        *self.slot.lock().expect("memory backend lock poisoned") = Some(data.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
