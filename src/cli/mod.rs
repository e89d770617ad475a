//! Command definitions and dispatch.

mod cache;
mod chat;
mod common;
mod config;
mod search;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "spark", version, about = "Conversational web search with a local answer cache")]
pub(crate) struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Config file (default: ~/.spark/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Ask a question and stream the answer
    Search {
        /// The question (optional when a file is attached)
        #[arg(required_unless_present = "file")]
        query: Vec<String>,
        /// Attach a file to the question
        #[arg(long, short)]
        file: Option<PathBuf>,
        /// MIME type of the attachment (guessed from the extension if omitted)
        #[arg(long, requires = "file")]
        mime: Option<String>,
        /// Stream the answer only, without follow-up questions or images
        #[arg(long)]
        no_related: bool,
    },
    /// Suggest completions for a partial query
    Suggest {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Interactive search session
    Chat,
    /// Inspect the answer cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub(crate) enum CacheAction {
    /// Show entry counts and location
    Stats,
}

#[derive(Debug, Subcommand)]
pub(crate) enum ConfigAction {
    /// Print the effective configuration (API key redacted)
    Show,
}

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = common::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Search {
            query,
            file,
            mime,
            no_related,
        } => search::cmd_search(config, query.join(" "), file, mime, no_related).await,
        Commands::Suggest { text } => search::cmd_suggest(config, text.join(" ")).await,
        Commands::Chat => chat::cmd_chat(config).await,
        Commands::Cache { action } => cache::cmd_cache(config, action),
        Commands::Config { action } => config::cmd_config(config, action),
    }
}
