//! Offline companion to the trainer-sprite server.
//!
//! Runs the same extraction and composition code against local files:
//!
//! ```bash
//! sprite-tool extract photo.jpg
//! sprite-tool compose --hair brown --cap none --top t-shirt -o sprite.png
//! sprite-tool assets
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use trainer_sprite::config::Config;
use trainer_sprite::features::{AttributeExtractor, FeatureSet};
use trainer_sprite::llm::VisionClient;
use trainer_sprite::sprite::{AssetStore, LayerOutcome, SpriteComposer};

#[derive(Debug, Parser)]
#[command(
    name = "sprite-tool",
    version,
    about = "Extract features and compose sprites from local files"
)]
struct Args {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Asset root directory, overrides `assets.root`
    #[arg(short, long, global = true)]
    assets: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify a local photo and print the feature set as JSON
    Extract {
        image: PathBuf,
    },
    /// Compose a sprite from explicit labels
    Compose {
        #[arg(long, default_value = "brown")]
        hair: String,
        #[arg(long, default_value = "none")]
        cap: String,
        #[arg(long, default_value = "t-shirt")]
        top: String,
        #[arg(short, long, default_value = "output_sprite.png")]
        output: PathBuf,
    },
    /// List the labels each layer has on disk
    Assets,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().context("Failed to load configuration")?,
    };
    if let Some(assets) = args.assets {
        config.assets.root = assets;
    }

    // Diagnostics on stderr so stdout stays machine readable
    trainer_sprite::logging::init_stderr()?;

    match args.command {
        Command::Extract { image } => {
            let img = image::open(&image)
                .with_context(|| format!("Failed to open image {}", image.display()))?;
            let extractor = AttributeExtractor::new(VisionClient::from_config(&config.llm));
            let features = extractor.extract(&img)?;
            println!("{}", serde_json::to_string_pretty(&features)?);
        }
        Command::Compose {
            hair,
            cap,
            top,
            output,
        } => {
            let composer = SpriteComposer::new(AssetStore::from_config(&config.assets));
            let features = FeatureSet::new(hair, cap, top);

            let composition = composer.render(&features)?;
            for outcome in &composition.layers {
                match outcome {
                    LayerOutcome::Applied(attribute) => {
                        eprintln!("Applied layer {}", attribute.layer())
                    }
                    LayerOutcome::Skipped(attribute, reason) => {
                        eprintln!("Skipping layer {}: {:?}", attribute.layer(), reason)
                    }
                }
            }

            let path = composition.save(&output)?;
            println!("{}", path.display());
        }
        Command::Assets => {
            let store = AssetStore::from_config(&config.assets);
            let base = store.base_path();
            println!("root: {}", store.root().display());
            println!(
                "base: {} ({})",
                base.display(),
                if base.is_file() { "present" } else { "missing" }
            );
            for (layer, labels) in store.inventory() {
                println!("{}: {}", layer, labels.join(", "));
            }
        }
    }

    Ok(())
}
