use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use trainer_sprite::config::Config;
use trainer_sprite::logging;
use trainer_sprite::server::{self, AppState};

/// HTTP service that classifies uploaded photos and composites trainer sprites.
#[derive(Debug, Parser)]
#[command(name = "trainer-sprite", version, after_help = ENV_HELP)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overrides `server.bind`
    #[arg(short, long)]
    bind: Option<String>,

    /// Asset root directory, overrides `assets.root`
    #[arg(short, long)]
    assets: Option<PathBuf>,
}

const ENV_HELP: &str = "ENVIRONMENT:
    TRAINER_SPRITE_CONFIG   Path to config file (overrides default location)
    TRAINER_SPRITE_LOG      Log filter (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/trainer-sprite/config.toml

See also: sprite-tool --help";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().context("Failed to load configuration")?,
    };
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(assets) = args.assets {
        config.assets.root = assets;
    }

    logging::init(config.logging.dir.clone())?;

    let state = AppState::from_config(&config);
    info!(
        provider = state.extractor.client().provider_name(),
        model = %config.llm.model,
        serialized = config.llm.serialize_requests,
        "Vision model ready"
    );

    let assets = state.composer.assets();
    if !assets.base_path().is_file() {
        warn!(path = %assets.base_path().display(), "Base asset missing, /sprite will fail");
    }
    for (layer, labels) in assets.inventory() {
        info!(layer, labels = ?labels, "Assets available");
    }

    server::run(&config, state).await
}
