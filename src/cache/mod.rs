//! Answer caching with TTL expiry and pluggable JSON persistence.

pub mod backend;
pub mod fingerprint;
pub mod response_cache;

pub use backend::{CacheBackend, FileBackend, MemoryBackend};
pub use fingerprint::fingerprint;
pub use response_cache::{
    now_millis, CacheEntry, CacheStats, ResponseCache, Source, CACHED_ENGINE, DEFAULT_TTL_MS,
};
