//! Search and suggest command handlers.

use std::path::PathBuf;

use anyhow::{bail, Result};
use futures::StreamExt;

use spark::config::Config;
use spark::search::{suggestions, AnswerBuilder};

use super::common::{build_engine, load_attachment, print_event, print_extras, print_usage};

/// Query sent when only a file is attached.
const FILE_ONLY_QUERY: &str = "Search Request";

/// The query to send, or `None` when there is nothing to ask.
fn effective_query(query: &str, has_file: bool) -> Option<String> {
    let query = query.trim();
    if !query.is_empty() {
        Some(query.to_string())
    } else if has_file {
        Some(FILE_ONLY_QUERY.to_string())
    } else {
        None
    }
}

/// Answer a single query.
pub(crate) async fn cmd_search(
    config: Config,
    query: String,
    file: Option<PathBuf>,
    mime: Option<String>,
    no_related: bool,
) -> Result<()> {
    let attachment = file
        .as_deref()
        .map(|path| load_attachment(path, mime))
        .transpose()?;
    let Some(query) = effective_query(&query, attachment.is_some()) else {
        bail!("Nothing to search: give a query or attach a file with --file");
    };
    let engine = build_engine(&config)?;

    if no_related {
        let mut builder = AnswerBuilder::new();
        let mut stream = engine.stream(&query, attachment);
        while let Some(event) = stream.next().await {
            print_event(&event);
            builder.apply(&event);
        }
        print_usage(&builder.finish());
    } else {
        let message = engine.answer(&query, attachment, print_event).await;
        print_extras(&message);
    }
    Ok(())
}

/// Print completions for a partial query, one per line.
pub(crate) async fn cmd_suggest(config: Config, text: String) -> Result<()> {
    let engine = build_engine(&config)?;
    for item in suggestions(engine.provider().as_ref(), &text).await {
        println!("{}", item);
    }
    Ok(())
}
