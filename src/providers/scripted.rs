//! Provider that replays canned answers. Used by tests and offline demos.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Result, SparkError};

use super::{ChatRequest, LLMProvider, LLMResponse};

/// Replays queued answers in order and records every request it receives.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    responses: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedProvider {
    /// Provider that answers with `responses` in order.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::default();
        for r in responses {
            provider.push_ok(r);
        }
        provider
    }

    /// Provider whose next call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        let provider = Self::default();
        provider.push_err(message);
        provider
    }

    pub fn push_ok(&self, text: impl Into<String>) {
        self.responses
            .lock()
            .expect("scripted responses lock poisoned")
            .push_back(Ok(text.into()));
    }

    pub fn push_err(&self, message: impl Into<String>) {
        self.responses
            .lock()
            .expect("scripted responses lock poisoned")
            .push_back(Err(message.into()));
    }

    /// Number of `chat` calls made so far.
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .expect("scripted requests lock poisoned")
            .len()
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .expect("scripted requests lock poisoned")
            .clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(&self, request: ChatRequest) -> Result<LLMResponse> {
        self.requests
            .lock()
            .expect("scripted requests lock poisoned")
            .push(request);
        let next = self
            .responses
            .lock()
            .expect("scripted responses lock poisoned")
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(LLMResponse::text(&text)),
            Some(Err(message)) => Err(SparkError::Provider(message)),
            None => Err(SparkError::Provider(
                "scripted provider exhausted responses".to_string(),
            )),
        }
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "Scripted"
    }
}
