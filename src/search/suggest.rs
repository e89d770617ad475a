//! One-shot helper prompts: query completions, follow-up questions, image links.
//!
//! Each helper sends a single prompt and parses the free-form reply. None of
//! them caches, retries, or returns an error; failures map to an empty list
//! or a fixed fallback.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::providers::{ChatRequest, LLMProvider};

/// Completions requested per input.
pub const SUGGESTION_COUNT: usize = 4;

/// Follow-up questions requested per answer.
pub const RELATED_COUNT: usize = 3;

/// Image links generated per query.
pub const IMAGE_COUNT: usize = 3;

/// Inputs shorter than this (after trimming) get no suggestions.
pub const MIN_SUGGESTION_INPUT: usize = 2;

/// Characters of the answer included in the follow-up prompt.
pub const RELATED_CONTEXT_CHARS: usize = 400;

/// Follow-ups used when the model cannot be reached or its reply is unusable.
pub const FALLBACK_RELATED: [&str; RELATED_COUNT] = [
    "Future of artificial general intelligence",
    "Quantum neural architectures",
    "Real-time knowledge synthesis",
];

/// Image used when keyword generation fails.
pub const FALLBACK_IMAGE: &str =
    "https://images.unsplash.com/photo-1451187580459-43490279c0fa?q=80&w=1200";

const IMAGE_BASE: &str = "https://loremflickr.com/1200/800/";

/// First `[` to last `]`, across newlines.
static JSON_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("valid JSON array regex"));

/// Pull a JSON array of strings out of free text.
pub fn extract_json_array(text: &str) -> Option<Vec<String>> {
    let m = JSON_ARRAY.find(text)?;
    serde_json::from_str(m.as_str()).ok()
}

/// Ask for search completions of a partial query.
pub async fn suggestions(provider: &dyn LLMProvider, input: &str) -> Vec<String> {
    let input = input.trim();
    if input.chars().count() < MIN_SUGGESTION_INPUT {
        return Vec::new();
    }

    let prompt = format!(
        "Provide {} logical search completions for: \"{}\". Return ONLY a JSON array of strings. \
         No extra text or markdown.",
        SUGGESTION_COUNT, input
    );
    match provider.chat(ChatRequest::new(prompt)).await {
        Ok(response) => {
            let mut items = extract_json_array(&response.content).unwrap_or_default();
            items.truncate(SUGGESTION_COUNT);
            items
        }
        Err(e) => {
            debug!("Suggestion request failed: {}", e);
            Vec::new()
        }
    }
}

/// Ask for follow-up questions given the query and the answer text.
pub async fn related_queries(provider: &dyn LLMProvider, query: &str, context: &str) -> Vec<String> {
    let context: String = context.chars().take(RELATED_CONTEXT_CHARS).collect();
    let prompt = format!(
        "Based on this summary: \"{}\", suggest {} intelligent follow-up questions for the \
         search: \"{}\". Return only a JSON array of strings.",
        context, RELATED_COUNT, query
    );

    let parsed = match provider.chat(ChatRequest::new(prompt)).await {
        Ok(response) => extract_json_array(&response.content),
        Err(e) => {
            debug!("Related query request failed: {}", e);
            None
        }
    };

    match parsed {
        Some(mut items) => {
            items.truncate(RELATED_COUNT);
            items
        }
        None => fallback_related(),
    }
}

pub fn fallback_related() -> Vec<String> {
    FALLBACK_RELATED.iter().map(|s| s.to_string()).collect()
}

/// Image links for a query, built from model-chosen keywords.
pub async fn image_urls(provider: &dyn LLMProvider, query: &str) -> Vec<String> {
    let prompt = format!(
        "Provide {} simple keywords for finding images related to: \"{}\". Comma separated only.",
        IMAGE_COUNT, query
    );
    let urls = match provider.chat(ChatRequest::new(prompt)).await {
        Ok(response) => keyword_image_urls(&response.content),
        Err(e) => {
            debug!("Image keyword request failed: {}", e);
            Vec::new()
        }
    };
    if urls.is_empty() {
        vec![FALLBACK_IMAGE.to_string()]
    } else {
        urls
    }
}

/// Turn a comma separated keyword list into image links.
pub fn keyword_image_urls(keywords: &str) -> Vec<String> {
    keywords
        .split(',')
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .take(IMAGE_COUNT)
        .enumerate()
        .filter_map(|(i, kw)| image_url(&kw, i))
        .collect()
}

fn image_url(keyword: &str, lock: usize) -> Option<String> {
    let mut url = Url::parse(IMAGE_BASE).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .push(keyword);
    url.set_query(Some(&format!("lock={}", lock)));
    Some(url.to_string())
}
