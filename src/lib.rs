//! Spark: conversational web search with a local answer cache.
//!
//! A query goes to a hosted model with web search enabled. The complete answer
//! is replayed as a stream of small text chunks so cached and live answers
//! look the same to the consumer, and it is cached for an hour keyed by the
//! query and any attached file.

pub mod cache;
pub mod config;
pub mod error;
pub mod providers;
pub mod search;

pub use error::{Result, SparkError};
