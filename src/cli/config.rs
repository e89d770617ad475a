//! Config command handlers.

use anyhow::{Context, Result};

use spark::config::Config;

use super::ConfigAction;

pub(crate) fn cmd_config(config: Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let json = serde_json::to_string_pretty(&config.redacted())
                .context("Failed to serialize config")?;
            println!("{}", json);
            println!();
            println!("Config file: {}", Config::path().display());
            println!("Cache file:  {}", config.cache.resolved_path().display());
        }
    }
    Ok(())
}
