//! Model providers.
//!
//! The search pipeline talks to the network through [`LLMProvider`]: one
//! prompt (plus an optional attachment) in, one complete answer out.

pub mod gemini;
pub mod scripted;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SparkError};

pub use gemini::GeminiProvider;
pub use scripted::ScriptedProvider;

/// A file sent alongside a query, as base64 with its MIME type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Base64 payload.
    pub data: String,
    pub mime_type: String,
}

impl Attachment {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Encode raw bytes.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::new(
            base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type,
        )
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// One request to a provider.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub prompt: String,
    pub attachment: Option<Attachment>,
    /// Ask the provider to ground the answer with web search.
    pub web_search: bool,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_attachment(mut self, attachment: Option<Attachment>) -> Self {
        self.attachment = attachment;
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }
}

/// A complete provider answer.
#[derive(Debug, Clone, PartialEq)]
pub struct LLMResponse {
    pub content: String,
}

impl LLMResponse {
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send one request and wait for the full answer.
    async fn chat(&self, request: ChatRequest) -> Result<LLMResponse>;

    fn default_model(&self) -> &str;

    fn name(&self) -> &str;

    /// Label shown to users for answers this provider produced.
    fn engine_label(&self) -> String {
        format!("{} ({})", self.name(), self.default_model())
    }
}

/// Map an HTTP error status and message to a [`SparkError`].
pub fn parse_provider_error(status: u16, message: &str) -> SparkError {
    match status {
        401 | 403 => SparkError::Unauthorized(message.to_string()),
        429 => SparkError::RateLimited(message.to_string()),
        _ => SparkError::Provider(format!("HTTP {}: {}", status, message)),
    }
}
