//! Native Gemini provider with Google Search grounding.
//!
//! Auth priority: config key → GEMINI_API_KEY → GOOGLE_API_KEY
//!
//! Web search is requested through the `google_search` tool. Attachments are
//! sent as an `inlineData` part next to the prompt. Thinking models return
//! parts tagged `thought: true`; those are dropped from the answer.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, SparkError};

use super::{parse_provider_error, ChatRequest, LLMProvider, LLMResponse};

/// Gemini v1beta REST API base.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Request timeout. A hung backend would otherwise stall the stream forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ── Auth ─────────────────────────────────────────────────────────────────────

/// Resolve the API key in priority order, skipping empty values.
pub fn resolve_api_key(explicit_key: Option<&str>, env_key: Option<&str>) -> Option<String> {
    explicit_key
        .filter(|k| !k.is_empty())
        .or_else(|| env_key.filter(|k| !k.is_empty()))
        .map(str::to_string)
}

// ── Provider ──────────────────────────────────────────────────────────────────

/// Gemini provider speaking the `generateContent` REST API directly.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SparkError::Provider(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: GEMINI_API_BASE.to_string(),
            client,
        })
    }

    /// Point the provider at a different API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build from an optional configured key, falling back to the environment.
    ///
    /// Returns a `Config` error when no key is available.
    pub fn from_config(api_key: Option<&str>, model: &str) -> Result<Self> {
        let env_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok();
        let key = resolve_api_key(api_key, env_key.as_deref()).ok_or_else(|| {
            SparkError::Config(
                "no Gemini API key: set provider.api_key in ~/.spark/config.json \
                 or export GEMINI_API_KEY"
                    .to_string(),
            )
        })?;
        Self::new(&key, model)
    }

    /// Build the `generateContent` body for one request.
    fn build_request_body(&self, request: &ChatRequest) -> Value {
        let mut parts = vec![json!({ "text": request.prompt })];
        if let Some(att) = &request.attachment {
            parts.push(json!({
                "inlineData": {
                    "mimeType": att.mime_type,
                    "data": att.data
                }
            }));
        }

        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": parts
            }]
        });

        if request.web_search {
            body["tools"] = json!([{ "google_search": {} }]);
        }

        body
    }

    /// Extract final answer text from a Gemini response.
    ///
    /// Falls back to thought text when no other parts exist.
    pub fn extract_text(response: &Value) -> Option<String> {
        let parts = response["candidates"][0]["content"]["parts"].as_array()?;

        let final_parts: Vec<&str> = parts
            .iter()
            .filter(|p| !p["thought"].as_bool().unwrap_or(false))
            .filter_map(|p| p["text"].as_str())
            .collect();

        if !final_parts.is_empty() {
            return Some(final_parts.join(""));
        }

        let thought_parts: Vec<&str> = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        if thought_parts.is_empty() {
            None
        } else {
            Some(thought_parts.join(""))
        }
    }

    fn api_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn chat(&self, request: ChatRequest) -> Result<LLMResponse> {
        let body = self.build_request_body(&request);

        debug!(
            model = %self.model,
            web_search = request.web_search,
            attachment = request.attachment.is_some(),
            "Gemini request"
        );

        let response = self
            .client
            .post(self.api_url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| SparkError::Provider(format!("Gemini request failed: {}", e)))?;

        if response.status().is_success() {
            let json: Value = response.json().await.map_err(|e| {
                SparkError::Provider(format!("Failed to parse Gemini response: {}", e))
            })?;

            let content = Self::extract_text(&json).ok_or_else(|| {
                SparkError::Provider("Gemini response contained no text".to_string())
            })?;

            return Ok(LLMResponse::text(&content));
        }

        let status = response.status().as_u16();
        let error_text = response.text().await.unwrap_or_default();

        let body_msg = serde_json::from_str::<Value>(&error_text)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(String::from))
            .unwrap_or(error_text);

        Err(parse_provider_error(status, &body_msg))
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "Gemini"
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
