mod bridge;
mod channels;
/// Slash commands
mod commands;
/// Discord setup and relaying
mod discord;
/// Relay message templates
mod format;
mod logger;
mod markup;
mod minecraft;
mod placeholder;
/// Looks up configured guild and channels
mod resolver;
/// Bot Settings
mod settings;
mod text;
mod watcher;

use anyhow::{Context, Result};
use bridge::CommandSink;
use settings::{ConfigSources, ConfigStore};
use std::sync::Arc;
use watcher::ConfigWatcher;

#[tokio::main]
async fn main() -> Result<()> {
    logger::init()?;

    let path = settings::config_dir().join(settings::FILENAME);
    settings::create_config_file(&path)?;

    let mut sources = ConfigSources::new(path);
    sources.overrides = settings::parse_property_overrides(std::env::args().skip(1));

    let store = match ConfigStore::load(sources) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!("{:#}", e);
            log::error!("Fill out the config and restart. Exiting...");
            std::process::exit(1);
        }
    };

    let _watcher = ConfigWatcher::start(store.clone())?;

    discord::run(store, CommandSink::stdout())
        .await
        .context("Failed to start discord.")
}
