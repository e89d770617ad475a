//! End-to-end search scenarios through the public API, with a file-backed cache.

use std::sync::Arc;

use futures::StreamExt;
use tempfile::TempDir;

use spark::cache::{fingerprint, FileBackend, ResponseCache, CACHED_ENGINE};
use spark::providers::{Attachment, LLMProvider, ScriptedProvider};
use spark::search::{ChunkPolicy, SearchEngine, SearchOptions, StreamEvent, FAILURE_MESSAGE};

fn engine(dir: &TempDir, provider: &ScriptedProvider) -> SearchEngine {
    let backend = FileBackend::new(dir.path().join("cache.json"));
    let cache = ResponseCache::with_default_ttl(Box::new(backend));
    SearchEngine::new(cache, Arc::new(provider.clone())).with_options(SearchOptions {
        cached_policy: ChunkPolicy::immediate(12),
        live_policy: ChunkPolicy::immediate(10),
        ..SearchOptions::default()
    })
}

async fn collect(engine: &SearchEngine, query: &str, file: Option<Attachment>) -> Vec<StreamEvent> {
    engine.stream(query, file).collect().await
}

fn text_of(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

fn completion(events: &[StreamEvent]) -> &StreamEvent {
    let completions: Vec<&StreamEvent> = events.iter().filter(|e| e.is_completion()).collect();
    assert_eq!(completions.len(), 1);
    assert!(events.last().unwrap().is_completion());
    completions[0]
}

#[tokio::test]
async fn live_answer_is_streamed_and_persisted() {
    let dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::new(["Light scatters off air molecules, blue the most."]);
    let engine = engine(&dir, &provider);

    let events = collect(&engine, "Why is the sky blue?", None).await;

    assert_eq!(text_of(&events), "Light scatters off air molecules, blue the most.");
    match completion(&events) {
        StreamEvent::Completion {
            is_cached, engine: label, ..
        } => {
            assert!(!is_cached);
            assert_eq!(label, &provider.engine_label());
        }
        _ => unreachable!(),
    }

    let stored = std::fs::read_to_string(dir.path().join("cache.json")).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&stored).unwrap();
    let key = fingerprint("Why is the sky blue?", None);
    assert_eq!(key, "spark_why is the sky blue?_no-file");
    assert_eq!(stored[&key]["text"], "Light scatters off air molecules, blue the most.");
}

#[tokio::test]
async fn repeated_query_is_served_from_cache_across_restarts() {
    let dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::new(["Paris is the capital of France."]);

    let first = collect(&engine(&dir, &provider), "Capital of France", None).await;

    // A fresh engine over the same file sees the stored answer.
    let reopened = engine(&dir, &provider);
    let second = collect(&reopened, "  capital of FRANCE ", None).await;

    assert_eq!(text_of(&second), text_of(&first));
    assert_eq!(provider.call_count(), 1);
    assert!(second.iter().all(|e| match e {
        StreamEvent::Text { is_cached, engine, .. } => *is_cached && engine == CACHED_ENGINE,
        _ => true,
    }));
    match completion(&second) {
        StreamEvent::Completion { is_cached, .. } => assert!(is_cached),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn provider_failure_ends_with_message_and_completion() {
    let dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::failing("connection reset");
    let engine = engine(&dir, &provider);

    let events = collect(&engine, "anything", None).await;

    assert_eq!(text_of(&events), FAILURE_MESSAGE);
    completion(&events);
    assert!(!dir.path().join("cache.json").exists());
}

#[tokio::test]
async fn malformed_cache_file_is_ignored() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("cache.json"), "{ this is not json").unwrap();
    let provider = ScriptedProvider::new(["recovered answer"]);
    let engine = engine(&dir, &provider);

    let events = collect(&engine, "q", None).await;

    assert_eq!(text_of(&events), "recovered answer");
    assert_eq!(provider.call_count(), 1);
    let stored = std::fs::read_to_string(dir.path().join("cache.json")).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&stored).is_ok());
}

#[tokio::test]
async fn attach_related_only_touches_existing_answers() {
    let dir = TempDir::new().unwrap();
    let provider = ScriptedProvider::new(["answer"]);
    let engine = engine(&dir, &provider);
    let file = Attachment::new("iVBORw0KGgoAAAANSUhEUgAAAAEAAAAB", "image/png");

    assert!(!engine.attach_related("q", Some(&file), vec!["x".into()]));
    assert!(!dir.path().join("cache.json").exists());

    collect(&engine, "q", Some(file.clone())).await;
    assert!(engine.attach_related("q", Some(&file), vec!["x".into()]));
    assert_eq!(engine.cached_related("q", Some(&file)), Some(vec!["x".to_string()]));
    assert!(engine.cached_related("q", None).is_none());
}
