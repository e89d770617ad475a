//! Shared helpers for command handlers.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use spark::config::Config;
use spark::providers::Attachment;
use spark::search::{ChatMessage, SearchEngine, StreamEvent};

/// Load config from `path` (or the default location) with env overrides applied.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env_overrides();
            Ok(config)
        }
        None => Config::load().context("Failed to load config"),
    }
}

pub(crate) fn build_engine(config: &Config) -> Result<SearchEngine> {
    SearchEngine::from_config(config).context(
        "Failed to create the search provider.\n\
         Set SPARK_PROVIDER_API_KEY (or GEMINI_API_KEY), or add provider.api_key to ~/.spark/config.json",
    )
}

/// Read a file into an attachment. The MIME type is guessed from the
/// extension unless given.
pub(crate) fn load_attachment(path: &Path, mime: Option<String>) -> Result<Attachment> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read attachment {}", path.display()))?;
    let mime = mime.unwrap_or_else(|| guess_mime(path).to_string());
    Ok(Attachment::from_bytes(&bytes, mime))
}

pub(crate) fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}

/// Print a stream event: status on stderr, answer text on stdout.
pub(crate) fn print_event(event: &StreamEvent) {
    match event {
        StreamEvent::Status { step } => eprintln!("[{}]", step),
        StreamEvent::Text { text, .. } => {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
        StreamEvent::Completion { .. } => println!(),
    }
}

/// Print everything after the answer text.
pub(crate) fn print_extras(message: &ChatMessage) {
    if !message.related_queries.is_empty() {
        println!();
        println!("Related:");
        for q in &message.related_queries {
            println!("  - {}", q);
        }
    }
    if !message.images.is_empty() {
        println!();
        println!("Images:");
        for url in &message.images {
            println!("  {}", url);
        }
    }
    print_usage(message);
}

pub(crate) fn print_usage(message: &ChatMessage) {
    if let Some(usage) = &message.usage {
        let origin = if usage.is_cached { "cached" } else { "live" };
        let latency = usage
            .latency_ms
            .map(|ms| format!(", {} ms", ms))
            .unwrap_or_default();
        eprintln!(
            "~{} tokens via {} ({}{})",
            usage.estimated_tokens, usage.engine, origin, latency
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(&PathBuf::from("a/photo.JPG")), "image/jpeg");
        assert_eq!(guess_mime(&PathBuf::from("doc.pdf")), "application/pdf");
        assert_eq!(guess_mime(&PathBuf::from("noext")), "application/octet-stream");
    }

    #[test]
    fn test_load_attachment_encodes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, b"hi").unwrap();

        let att = load_attachment(&path, None).unwrap();
        assert_eq!(att.mime_type, "text/plain");
        assert_eq!(att.data, "aGk=");

        let att = load_attachment(&path, Some("text/markdown".into())).unwrap();
        assert_eq!(att.mime_type, "text/markdown");
    }

    #[test]
    fn test_load_attachment_missing_file() {
        let err = load_attachment(Path::new("/nonexistent/spark.bin"), None).unwrap_err();
        assert!(err.to_string().contains("Failed to read attachment"));
    }

    #[test]
    fn test_load_config_missing_file_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(Some(&dir.path().join("absent.json"))).unwrap();
        assert!(config.provider.web_search);
    }
}
