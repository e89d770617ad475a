//! Search pipeline: cached pseudo-streaming answers and helper prompts.
//!
//! # Example
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use spark::cache::{MemoryBackend, ResponseCache};
//! use spark::providers::ScriptedProvider;
//! use spark::search::{ChunkPolicy, SearchEngine, SearchOptions, StreamEvent};
//!
//! let cache = ResponseCache::with_default_ttl(Box::new(MemoryBackend::new()));
//! let provider = ScriptedProvider::new(["The sky is blue."]);
//! let engine = SearchEngine::new(cache, Arc::new(provider)).with_options(SearchOptions {
//!     cached_policy: ChunkPolicy::immediate(12),
//!     live_policy: ChunkPolicy::immediate(10),
//!     ..Default::default()
//! });
//!
//! let events: Vec<StreamEvent> = engine.stream("Why is the sky blue?", None).collect().await;
//! assert!(events.last().unwrap().is_completion());
//! # });
//! ```

pub mod answer;
pub mod stream;
pub mod suggest;

pub use answer::{estimate_tokens, AnswerBuilder, ChatMessage, Role, UsageStats};
pub use stream::{
    ChunkPolicy, SearchEngine, SearchOptions, SearchStream, StreamEvent, FAILURE_MESSAGE,
};
pub use suggest::{image_urls, related_queries, suggestions};
