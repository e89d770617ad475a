//! Folding a search stream into a finished chat message.

use std::time::Instant;

use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::cache::Source;
use crate::providers::Attachment;

use super::stream::{SearchEngine, StreamEvent};
use super::suggest::{image_urls, related_queries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Per-answer bookkeeping shown next to the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub estimated_tokens: usize,
    pub engine: String,
    pub is_cached: bool,
    /// Time from request to completion.
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub related_queries: Vec<String>,
    pub usage: Option<UsageStats>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: Vec::new(),
            sources: Vec::new(),
            related_queries: Vec::new(),
            usage: None,
        }
    }
}

/// Rough token count: four characters per token, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Accumulates stream events into an assistant message.
#[derive(Debug)]
pub struct AnswerBuilder {
    text: String,
    engine: Option<String>,
    is_cached: bool,
    sources: Vec<Source>,
    done: bool,
    started: Instant,
}

impl Default for AnswerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerBuilder {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            engine: None,
            is_cached: false,
            sources: Vec::new(),
            done: false,
            started: Instant::now(),
        }
    }

    /// Fold one event. Status markers carry nothing to keep; events after the
    /// completion are ignored.
    pub fn apply(&mut self, event: &StreamEvent) {
        if self.done {
            return;
        }
        match event {
            StreamEvent::Status { .. } => {}
            StreamEvent::Text {
                text,
                engine,
                is_cached,
            } => {
                self.text.push_str(text);
                self.engine = Some(engine.clone());
                self.is_cached = *is_cached;
            }
            StreamEvent::Completion {
                sources,
                engine,
                is_cached,
            } => {
                self.sources = sources.clone();
                self.engine = Some(engine.clone());
                self.is_cached = *is_cached;
                self.done = true;
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish(self) -> ChatMessage {
        let latency_ms = self.started.elapsed().as_millis() as u64;
        ChatMessage {
            role: Role::Assistant,
            usage: Some(UsageStats {
                estimated_tokens: estimate_tokens(&self.text),
                engine: self.engine.unwrap_or_default(),
                is_cached: self.is_cached,
                latency_ms: Some(latency_ms),
            }),
            content: self.text,
            images: Vec::new(),
            sources: self.sources,
            related_queries: Vec::new(),
        }
    }
}

impl SearchEngine {
    /// Run a full search: stream the answer, then gather follow-ups and images.
    ///
    /// `on_event` sees every stream event as it arrives. Image keywords are
    /// requested while the answer streams. Follow-up questions stored with a
    /// cached answer are reused; otherwise they are requested and written back
    /// to the cache entry.
    pub async fn answer<F>(&self, query: &str, file: Option<Attachment>, mut on_event: F) -> ChatMessage
    where
        F: FnMut(&StreamEvent),
    {
        let provider = self.provider().as_ref();
        let mut builder = AnswerBuilder::new();
        let mut stream = self.stream(query, file.clone());

        let consume = async {
            while let Some(event) = stream.next().await {
                on_event(&event);
                builder.apply(&event);
            }
        };
        let ((), images) = tokio::join!(consume, image_urls(provider, query));

        let related = match self.cached_related(query, file.as_ref()) {
            Some(stored) => stored,
            None => {
                let related = related_queries(provider, query, builder.text()).await;
                self.attach_related(query, file.as_ref(), related.clone());
                related
            }
        };

        let mut message = builder.finish();
        message.images = images;
        message.related_queries = related;
        message
    }
}
