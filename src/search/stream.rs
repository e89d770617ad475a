//! Pseudo-streaming search pipeline.
//!
//! The provider is called once and returns a complete answer. The answer is
//! then cut into small word groups and emitted with a fixed pause between
//! them, so a cached answer and a live one look the same to the consumer.
//!
//! Every stream ends with exactly one [`StreamEvent::Completion`], including
//! when the provider call fails.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::Stream;
use tracing::{debug, error, info};

use crate::cache::{fingerprint, CacheEntry, FileBackend, ResponseCache, Source, CACHED_ENGINE};
use crate::config::Config;
use crate::error::Result;
use crate::providers::{Attachment, ChatRequest, GeminiProvider, LLMProvider};

/// Answer text substituted when the provider call fails.
pub const FAILURE_MESSAGE: &str =
    "Search failed: the connection to the answer engine was interrupted. Please try again.";

pub const STEP_CACHE_HIT: &str = "Accessing local memory sector...";
pub const STEP_CONNECT: &str = "Initializing neural bridge...";
pub const STEP_WEB_SEARCH: &str = "Engaging live web search...";
pub const STEP_SYNTHESIZE: &str = "Synthesizing answer...";

// ============================================================================
// Chunking
// ============================================================================

/// How an answer is cut up and paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    /// Words per emitted chunk. Zero is treated as one.
    pub words_per_chunk: usize,
    /// Pause before each chunk.
    pub delay: Duration,
}

impl ChunkPolicy {
    pub const fn new(words_per_chunk: usize, delay: Duration) -> Self {
        Self {
            words_per_chunk,
            delay,
        }
    }

    /// Pacing for cache replays: 12 words every 15 ms.
    pub const fn cached() -> Self {
        Self::new(12, Duration::from_millis(15))
    }

    /// Pacing for live answers: 10 words every 20 ms.
    pub const fn live() -> Self {
        Self::new(10, Duration::from_millis(20))
    }

    /// Same grouping without any pause.
    pub const fn immediate(words_per_chunk: usize) -> Self {
        Self::new(words_per_chunk, Duration::ZERO)
    }

    /// Split `text` on single spaces into groups of `words_per_chunk` words.
    ///
    /// Every group except the last keeps one trailing space, so the chunks
    /// concatenate back to `text` exactly. Empty text yields no chunks.
    pub fn chunks(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let size = self.words_per_chunk.max(1);
        let words: Vec<&str> = text.split(' ').collect();
        let groups = words.chunks(size).count();
        words
            .chunks(size)
            .enumerate()
            .map(|(i, group)| {
                let mut chunk = group.join(" ");
                if i + 1 < groups {
                    chunk.push(' ');
                }
                chunk
            })
            .collect()
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// One item of a search stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Cosmetic progress marker.
    Status { step: String },
    /// A fragment of the answer.
    Text {
        text: String,
        engine: String,
        is_cached: bool,
    },
    /// Terminal event. Nothing follows it.
    Completion {
        sources: Vec<Source>,
        engine: String,
        is_cached: bool,
    },
}

impl StreamEvent {
    fn status(step: &str) -> Self {
        Self::Status {
            step: step.to_string(),
        }
    }

    pub fn is_completion(&self) -> bool {
        matches!(self, Self::Completion { .. })
    }
}

pub type SearchStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

// ============================================================================
// SearchEngine
// ============================================================================

/// Per-engine request and pacing settings.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub web_search: bool,
    pub cached_policy: ChunkPolicy,
    pub live_policy: ChunkPolicy,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            web_search: true,
            cached_policy: ChunkPolicy::cached(),
            live_policy: ChunkPolicy::live(),
        }
    }
}

/// Cache-backed search over a single provider.
///
/// Clones share the cache and provider. Overlapping streams for the same
/// fingerprint are not coalesced: each calls the provider and the last one to
/// finish wins the cache slot.
#[derive(Clone)]
pub struct SearchEngine {
    cache: Arc<Mutex<ResponseCache>>,
    provider: Arc<dyn LLMProvider>,
    options: SearchOptions,
}

impl SearchEngine {
    pub fn new(cache: ResponseCache, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            cache: Arc::new(Mutex::new(cache)),
            provider,
            options: SearchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// File-backed cache plus a Gemini provider, as configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = FileBackend::new(config.cache.resolved_path());
        let cache = ResponseCache::new(Box::new(backend), config.cache.ttl_ms);

        let mut gemini =
            GeminiProvider::from_config(config.provider.api_key.as_deref(), &config.provider.model)?;
        if let Some(base_url) = &config.provider.base_url {
            gemini = gemini.with_base_url(base_url.as_str());
        }

        let options = SearchOptions {
            web_search: config.provider.web_search,
            cached_policy: config.stream.cached_policy(),
            live_policy: config.stream.live_policy(),
        };

        Ok(Self::new(cache, Arc::new(gemini)).with_options(options))
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    pub fn cache(&self) -> &Arc<Mutex<ResponseCache>> {
        &self.cache
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Stream the answer to `query`.
    ///
    /// Nothing happens until the stream is polled. Dropping it stops further
    /// emission; a live answer dropped before its last chunk is not cached.
    pub fn stream(&self, query: &str, file: Option<Attachment>) -> SearchStream {
        let cache = Arc::clone(&self.cache);
        let provider = Arc::clone(&self.provider);
        let options = self.options.clone();
        let query = query.to_string();

        Box::pin(async_stream::stream! {
            let key = fingerprint(&query, file.as_ref());
            let cached = cache
                .lock()
                .expect("response cache lock poisoned")
                .get(&key)
                .cloned();

            if let Some(entry) = cached {
                debug!(key = %key, "Cache hit");
                yield StreamEvent::status(STEP_CACHE_HIT);
                for chunk in options.cached_policy.chunks(&entry.text) {
                    options.cached_policy.pause().await;
                    yield StreamEvent::Text {
                        text: chunk,
                        engine: CACHED_ENGINE.to_string(),
                        is_cached: true,
                    };
                }
                yield StreamEvent::Completion {
                    sources: entry.sources,
                    engine: CACHED_ENGINE.to_string(),
                    is_cached: true,
                };
                return;
            }

            debug!(key = %key, "Cache miss");
            yield StreamEvent::status(STEP_CONNECT);
            yield StreamEvent::status(STEP_WEB_SEARCH);

            let engine = provider.engine_label();
            let request = ChatRequest::new(query.as_str())
                .with_attachment(file)
                .with_web_search(options.web_search);
            let started = Instant::now();

            match provider.chat(request).await {
                Ok(response) => {
                    info!(
                        engine = %engine,
                        chars = response.content.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Live answer received"
                    );
                    yield StreamEvent::status(STEP_SYNTHESIZE);
                    for chunk in options.live_policy.chunks(&response.content) {
                        options.live_policy.pause().await;
                        yield StreamEvent::Text {
                            text: chunk,
                            engine: engine.clone(),
                            is_cached: false,
                        };
                    }
                    cache
                        .lock()
                        .expect("response cache lock poisoned")
                        .put(key, CacheEntry::new(response.content, engine.as_str()));
                    yield StreamEvent::Completion {
                        sources: Vec::new(),
                        engine,
                        is_cached: false,
                    };
                }
                Err(e) => {
                    error!(engine = %engine, "Search request failed: {}", e);
                    yield StreamEvent::Text {
                        text: FAILURE_MESSAGE.to_string(),
                        engine: engine.clone(),
                        is_cached: false,
                    };
                    yield StreamEvent::Completion {
                        sources: Vec::new(),
                        engine,
                        is_cached: false,
                    };
                }
            }
        })
    }

    /// Store follow-up queries on the cached answer for `query`, if any.
    pub fn attach_related(
        &self,
        query: &str,
        file: Option<&Attachment>,
        related: Vec<String>,
    ) -> bool {
        let key = fingerprint(query, file);
        self.cache
            .lock()
            .expect("response cache lock poisoned")
            .attach_related(&key, related)
    }

    /// Related queries stored with a fresh cached answer, if any.
    pub fn cached_related(&self, query: &str, file: Option<&Attachment>) -> Option<Vec<String>> {
        let key = fingerprint(query, file);
        self.cache
            .lock()
            .expect("response cache lock poisoned")
            .get(&key)
            .map(|e| e.related_queries.clone())
            .filter(|related| !related.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use crate::providers::ScriptedProvider;
    use futures::StreamExt;

    fn engine_with(provider: ScriptedProvider) -> SearchEngine {
        let cache = ResponseCache::with_default_ttl(Box::new(MemoryBackend::new()));
        SearchEngine::new(cache, Arc::new(provider)).with_options(SearchOptions {
            cached_policy: ChunkPolicy::immediate(12),
            live_policy: ChunkPolicy::immediate(10),
            ..SearchOptions::default()
        })
    }

    fn joined_text(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_chunks_concatenate_to_input() {
        let text = "one two three four five six seven eight nine ten eleven twelve thirteen";
        let chunks = ChunkPolicy::immediate(5).chunks(text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "one two three four five ");
        assert_eq!(chunks[2], "eleven twelve thirteen");
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_chunks_preserve_newlines_and_double_spaces() {
        let text = "line one\nline two  spaced\n\n- bullet";
        let chunks = ChunkPolicy::immediate(2).chunks(text);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_chunks_empty_text() {
        assert!(ChunkPolicy::cached().chunks("").is_empty());
    }

    #[test]
    fn test_chunks_zero_size_treated_as_one() {
        let chunks = ChunkPolicy::immediate(0).chunks("a b c");
        assert_eq!(chunks, vec!["a ", "b ", "c"]);
    }

    #[test]
    fn test_default_policies() {
        assert_eq!(ChunkPolicy::cached().words_per_chunk, 12);
        assert_eq!(ChunkPolicy::cached().delay, Duration::from_millis(15));
        assert_eq!(ChunkPolicy::live().words_per_chunk, 10);
        assert_eq!(ChunkPolicy::live().delay, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_live_stream_shape() {
        let provider = ScriptedProvider::new(["Sunny with a light breeze"]);
        let engine = engine_with(provider.clone());

        let events: Vec<StreamEvent> = engine.stream("weather today", None).collect().await;

        assert!(matches!(events[0], StreamEvent::Status { .. }));
        assert_eq!(joined_text(&events), "Sunny with a light breeze");
        assert_eq!(events.iter().filter(|e| e.is_completion()).count(), 1);
        assert!(matches!(
            events.last(),
            Some(StreamEvent::Completion { is_cached: false, engine: label, .. }) if label == "Scripted (scripted)"
        ));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_live_request_carries_options() {
        let provider = ScriptedProvider::new(["ok"]);
        let engine = engine_with(provider.clone());
        let file = Attachment::new("aGVsbG8=", "text/plain");

        let _: Vec<StreamEvent> = engine.stream("Summarize", Some(file)).collect().await;

        let request = &provider.requests()[0];
        assert_eq!(request.prompt, "Summarize");
        assert!(request.web_search);
        assert_eq!(request.attachment.as_ref().unwrap().mime_type, "text/plain");
    }

    #[tokio::test]
    async fn test_text_events_are_tagged_live() {
        let provider = ScriptedProvider::new(["a b c d e f g h i j k l"]);
        let engine = engine_with(provider);
        let events: Vec<StreamEvent> = engine.stream("letters", None).collect().await;
        let texts: Vec<&StreamEvent> = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Text { .. }))
            .collect();
        // 12 words, 10 per live chunk.
        assert_eq!(texts.len(), 2);
        for event in texts {
            assert!(matches!(event, StreamEvent::Text { is_cached: false, .. }));
        }
    }

    #[tokio::test]
    async fn test_second_query_served_from_cache() {
        let provider = ScriptedProvider::new(["The answer is forty two"]);
        let engine = engine_with(provider.clone());

        let _: Vec<StreamEvent> = engine.stream("meaning of life", None).collect().await;
        let events: Vec<StreamEvent> = engine.stream("  Meaning of LIFE ", None).collect().await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(
            events[0],
            StreamEvent::Status {
                step: STEP_CACHE_HIT.to_string()
            }
        );
        assert_eq!(joined_text(&events), "The answer is forty two");
        assert!(matches!(
            events.last(),
            Some(StreamEvent::Completion { is_cached: true, engine: label, .. }) if label == CACHED_ENGINE
        ));
    }

    #[tokio::test]
    async fn test_cache_hit_replays_sources() {
        let provider = ScriptedProvider::default();
        let engine = engine_with(provider.clone());
        let mut entry = CacheEntry::new("cached body", "Gemini (x)");
        entry.sources.push(Source {
            title: "Docs".into(),
            uri: "https://example.com".into(),
        });
        engine
            .cache()
            .lock()
            .unwrap()
            .put(fingerprint("q", None), entry);

        let events: Vec<StreamEvent> = engine.stream("q", None).collect().await;
        match events.last() {
            Some(StreamEvent::Completion { sources, .. }) => assert_eq!(sources[0].title, "Docs"),
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_yields_message_then_completion() {
        let provider = ScriptedProvider::failing("connection reset");
        let engine = engine_with(provider);

        let events: Vec<StreamEvent> = engine.stream("anything", None).collect().await;
        let tail: Vec<&StreamEvent> = events
            .iter()
            .filter(|e| !matches!(e, StreamEvent::Status { .. }))
            .collect();

        assert_eq!(tail.len(), 2);
        assert!(matches!(tail[0], StreamEvent::Text { text, .. } if text == FAILURE_MESSAGE));
        assert!(matches!(tail[1], StreamEvent::Completion { is_cached: false, .. }));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let provider = ScriptedProvider::failing("boom");
        provider.push_ok("recovered");
        let engine = engine_with(provider.clone());

        let _: Vec<StreamEvent> = engine.stream("retry me", None).collect().await;
        assert!(engine.cache().lock().unwrap().is_empty());

        let events: Vec<StreamEvent> = engine.stream("retry me", None).collect().await;
        assert_eq!(joined_text(&events), "recovered");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let provider = ScriptedProvider::new(["x"]);
        let engine = engine_with(provider.clone());
        let stream = engine.stream("lazy", None);
        assert_eq!(provider.call_count(), 0);
        drop(stream);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_attach_related_and_cached_related() {
        let provider = ScriptedProvider::new(["body"]);
        let engine = engine_with(provider);
        assert!(!engine.attach_related("topic", None, vec!["a".into()]));
        assert!(engine.cached_related("topic", None).is_none());

        let _: Vec<StreamEvent> = engine.stream("topic", None).collect().await;
        assert!(engine.cached_related("topic", None).is_none());
        assert!(engine.attach_related("Topic", None, vec!["a".into(), "b".into()]));
        assert_eq!(
            engine.cached_related("topic", None),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[tokio::test]
    async fn test_corrupt_storage_starts_empty_and_recovers() {
        let backend = MemoryBackend::with_contents("{not valid json");
        let cache = ResponseCache::with_default_ttl(Box::new(backend.clone()));
        assert!(cache.is_empty());

        let provider = ScriptedProvider::new(["fresh answer"]);
        let engine = SearchEngine::new(cache, Arc::new(provider.clone())).with_options(SearchOptions {
            cached_policy: ChunkPolicy::immediate(12),
            live_policy: ChunkPolicy::immediate(10),
            ..SearchOptions::default()
        });

        let events: Vec<StreamEvent> = engine.stream("q", None).collect().await;
        assert_eq!(joined_text(&events), "fresh answer");
        assert_eq!(provider.call_count(), 1);

        let stored: serde_json::Value =
            serde_json::from_str(&backend.contents().unwrap()).unwrap();
        assert_eq!(stored["spark_q_no-file"]["text"], "fresh answer");
    }

    #[tokio::test]
    async fn test_attachment_changes_cache_key() {
        let provider = ScriptedProvider::new(["plain", "with file"]);
        let engine = engine_with(provider.clone());
        let file = Attachment::new("iVBORw0KGgoAAAANSUhEUgAAAAEAAAAB", "image/png");

        let _: Vec<StreamEvent> = engine.stream("what is this", None).collect().await;
        let events: Vec<StreamEvent> = engine
            .stream("what is this", Some(file.clone()))
            .collect()
            .await;
        assert_eq!(joined_text(&events), "with file");
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.requests()[1].attachment, Some(file));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_pacing_live_then_cached() {
        let words: Vec<String> = (1..=25).map(|i| format!("w{}", i)).collect();
        let answer = words.join(" ");
        let provider = ScriptedProvider::new([answer.as_str()]);
        let cache = ResponseCache::with_default_ttl(Box::new(MemoryBackend::new()));
        let engine = SearchEngine::new(cache, Arc::new(provider.clone()));

        let started = tokio::time::Instant::now();
        let live: Vec<StreamEvent> = engine.stream("pacing", None).collect().await;
        let live_elapsed = started.elapsed();
        let live_chunks: Vec<&StreamEvent> = live
            .iter()
            .filter(|e| matches!(e, StreamEvent::Text { .. }))
            .collect();
        assert_eq!(live_chunks.len(), 3);
        assert_eq!(joined_text(&live), answer);
        assert!(live_elapsed >= Duration::from_millis(60));
        assert!(live_elapsed < Duration::from_millis(70));

        let started = tokio::time::Instant::now();
        let cached: Vec<StreamEvent> = engine.stream("pacing", None).collect().await;
        let cached_elapsed = started.elapsed();
        let cached_texts: Vec<&str> = cached
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Text { text, is_cached: true, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(cached_texts.len(), 3);
        assert_eq!(cached_texts[0].split_whitespace().count(), 12);
        assert_eq!(cached_texts[2], "w25");
        assert_eq!(joined_text(&cached), answer);
        assert!(cached_elapsed >= Duration::from_millis(45));
        assert!(cached_elapsed < Duration::from_millis(55));
        assert_eq!(provider.call_count(), 1);
    }
}
