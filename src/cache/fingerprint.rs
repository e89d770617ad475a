//! Cache key derivation.
//!
//! A fingerprint is `spark_<normalized query>_<file prefix>`, where the query
//! is trimmed and lowercased and the file prefix is the first 32 characters of
//! the attachment's base64 payload (or `no-file`).
//!
//! This is not a hash: two attachments that share their first 32 characters
//! map to the same key. Base64 of files with a common header (e.g. two PNGs
//! of the same dimensions) can collide, and the cached answer for one is
//! served for the other.

use crate::providers::Attachment;

/// Key component used when no file is attached.
pub const NO_FILE_SENTINEL: &str = "no-file";

/// Number of payload characters that identify an attachment.
pub const FILE_PREFIX_CHARS: usize = 32;

/// Build the cache key for a query and optional attachment.
pub fn fingerprint(query: &str, file: Option<&Attachment>) -> String {
    let file_part = match file {
        Some(f) => f.data.chars().take(FILE_PREFIX_CHARS).collect::<String>(),
        None => NO_FILE_SENTINEL.to_string(),
    };
    format!("spark_{}_{}", normalize_query(query), file_part)
}

/// Trim and lowercase a query for keying.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}
