use image::{imageops, ImageFormat, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};

use super::assets::AssetStore;
use crate::error::{Error, Result};
use crate::features::{Attribute, FeatureSet, NONE_LABEL};

/// Why an overlay layer was left out of a sprite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Label is the `none` sentinel.
    Sentinel,
    /// No asset for this label.
    NotFound(PathBuf),
    /// Asset exists but could not be decoded.
    Unreadable(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerOutcome {
    Applied(Attribute),
    Skipped(Attribute, SkipReason),
}

/// A composited sprite held in memory, plus what happened to each overlay.
#[derive(Debug)]
pub struct Composition {
    pub image: RgbaImage,
    pub layers: Vec<LayerOutcome>,
}

impl Composition {
    pub fn applied(&self) -> Vec<Attribute> {
        self.layers
            .iter()
            .filter_map(|outcome| match outcome {
                LayerOutcome::Applied(attribute) => Some(*attribute),
                LayerOutcome::Skipped(..) => None,
            })
            .collect()
    }

    /// Write as PNG. The file appears at `out_path` only once fully written.
    pub fn save(&self, out_path: &Path) -> Result<PathBuf> {
        let parent = match out_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let staged = tempfile::Builder::new()
            .prefix(".sprite-")
            .suffix(".png")
            .tempfile_in(parent)?;
        self.image.save_with_format(staged.path(), ImageFormat::Png)?;
        staged.persist(out_path).map_err(|e| Error::Io(e.error))?;

        tracing::info!(
            path = %out_path.display(),
            layers = ?self.applied(),
            "Sprite saved"
        );
        Ok(out_path.to_path_buf())
    }
}

/// Stacks overlay layers onto the base body in the order hair, cap, top.
#[derive(Debug, Clone)]
pub struct SpriteComposer {
    assets: AssetStore,
}

impl SpriteComposer {
    pub fn new(assets: AssetStore) -> Self {
        Self { assets }
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Composite in memory without writing anything.
    pub fn render(&self, features: &FeatureSet) -> Result<Composition> {
        let base_path = self.assets.base_path();
        if !base_path.is_file() {
            return Err(Error::AssetMissing(base_path.to_path_buf()));
        }

        let mut image = image::open(base_path)?.to_rgba8();
        let mut layers = Vec::with_capacity(Attribute::ALL.len());

        for attribute in Attribute::ALL {
            let label = features.get(attribute);
            let outcome = self.apply_layer(&mut image, attribute, label)?;
            if let LayerOutcome::Skipped(_, reason) = &outcome {
                tracing::debug!(
                    layer = attribute.layer(),
                    label = %label,
                    reason = ?reason,
                    "Skipping layer"
                );
            }
            layers.push(outcome);
        }

        Ok(Composition { image, layers })
    }

    /// Composite and write a PNG to `out_path`, creating parent directories.
    pub fn compose(&self, features: &FeatureSet, out_path: &Path) -> Result<PathBuf> {
        self.render(features)?.save(out_path)
    }

    fn apply_layer(
        &self,
        image: &mut RgbaImage,
        attribute: Attribute,
        label: &str,
    ) -> Result<LayerOutcome> {
        if label == NONE_LABEL {
            return Ok(LayerOutcome::Skipped(attribute, SkipReason::Sentinel));
        }

        let path = self.assets.overlay_path(attribute, label)?;
        if !path.is_file() {
            return Ok(LayerOutcome::Skipped(attribute, SkipReason::NotFound(path)));
        }

        let layer = match image::open(&path) {
            Ok(layer) => layer.to_rgba8(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load layer");
                return Ok(LayerOutcome::Skipped(attribute, SkipReason::Unreadable(path)));
            }
        };

        imageops::overlay(image, &layer, 0, 0);
        Ok(LayerOutcome::Applied(attribute))
    }
}
