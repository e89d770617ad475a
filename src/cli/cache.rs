//! Cache command handlers.

use anyhow::Result;
use chrono::{DateTime, Local};

use spark::cache::{FileBackend, ResponseCache};
use spark::config::Config;

use super::CacheAction;

pub(crate) fn cmd_cache(config: Config, action: CacheAction) -> Result<()> {
    match action {
        CacheAction::Stats => cmd_cache_stats(&config),
    }
}

/// Stats need no provider, so this works without an API key.
fn cmd_cache_stats(config: &Config) -> Result<()> {
    let backend = FileBackend::new(config.cache.resolved_path());
    let cache = ResponseCache::new(Box::new(backend), config.cache.ttl_ms);
    let stats = cache.stats();

    println!("Cache: {}", cache.location());
    println!("  TTL:     {} ms", cache.ttl_ms());
    println!(
        "  Entries: {} ({} fresh)",
        stats.total_entries, stats.fresh_entries
    );
    println!("  Size:    {} bytes", stats.total_bytes);
    if let Some(oldest) = stats.oldest_timestamp {
        println!("  Oldest:  {}", format_timestamp(oldest));
    }
    if let Some(newest) = stats.newest_timestamp {
        println!("  Newest:  {}", format_timestamp(newest));
    }
    Ok(())
}

fn format_timestamp(epoch_ms: u64) -> String {
    DateTime::from_timestamp_millis(epoch_ms as i64)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch_ms.to_string())
}
