use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::AssetConfig;
use crate::error::{Error, Result};
use crate::features::Attribute;

const MAX_LABEL_LEN: usize = 64;

/// Read-only tree of layer images: `{root}/{layer}/{label}.png`.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    base: PathBuf,
}

impl AssetStore {
    /// `base` is relative to `root`.
    pub fn new(root: impl Into<PathBuf>, base: impl AsRef<Path>) -> Self {
        let root = root.into();
        let base = root.join(base);
        Self { root, base }
    }

    pub fn from_config(config: &AssetConfig) -> Self {
        Self::new(&config.root, &config.base)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    /// Path of the overlay image for `label`. Does not touch the filesystem.
    pub fn overlay_path(&self, attribute: Attribute, label: &str) -> Result<PathBuf> {
        overlay_path(&self.root, attribute, label)
    }

    /// Labels with an image on disk, per layer, sorted.
    pub fn inventory(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut inventory = BTreeMap::new();

        for attribute in Attribute::ALL {
            let layer_dir = self.root.join(attribute.layer());
            let mut labels: Vec<String> = WalkDir::new(&layer_dir)
                .min_depth(1)
                .max_depth(1)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| {
                    e.path()
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
                })
                .filter_map(|e| {
                    e.path()
                        .file_stem()
                        .map(|stem| stem.to_string_lossy().to_string())
                })
                .collect();
            labels.sort();
            inventory.insert(attribute.layer(), labels);
        }

        inventory
    }
}

/// Resolve the overlay template for one attribute.
///
/// Labels may come from model output, so anything other than lowercase
/// ASCII letters, digits, `-` and `_` is rejected before it reaches a path.
pub fn overlay_path(root: &Path, attribute: Attribute, label: &str) -> Result<PathBuf> {
    if !is_safe_label(label) {
        return Err(Error::InvalidLabel {
            layer: attribute.layer(),
            label: label.to_string(),
        });
    }

    Ok(root.join(attribute.layer()).join(format!("{}.png", label)))
}

fn is_safe_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_overlay_path_template() {
        let path = overlay_path(Path::new("assets"), Attribute::TopStyle, "t-shirt").unwrap();
        assert_eq!(path, PathBuf::from("assets/top/t-shirt.png"));

        let path = overlay_path(Path::new("assets"), Attribute::CapColor, "none").unwrap();
        assert_eq!(path, PathBuf::from("assets/cap/none.png"));
    }

    #[test]
    fn test_overlay_path_rejects_traversal() {
        for label in ["../secret", "..", "a/b", "/etc/passwd", "", "Brown", "red.png", "a\\b"] {
            let err = overlay_path(Path::new("assets"), Attribute::HairColor, label).unwrap_err();
            assert!(matches!(err, Error::InvalidLabel { layer: "hair", .. }), "{label:?}");
        }

        let long = "a".repeat(MAX_LABEL_LEN + 1);
        assert!(overlay_path(Path::new("assets"), Attribute::HairColor, &long).is_err());
    }

    #[test]
    fn test_store_paths() {
        let store = AssetStore::new("assets", "base_body/trainer_base.png");
        assert_eq!(store.root(), Path::new("assets"));
        assert_eq!(store.base_path(), Path::new("assets/base_body/trainer_base.png"));
        assert_eq!(
            store.overlay_path(Attribute::HairColor, "brown").unwrap(),
            PathBuf::from("assets/hair/brown.png")
        );
    }

    #[test]
    fn test_inventory() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("hair")).unwrap();
        fs::create_dir_all(dir.path().join("top/nested")).unwrap();
        File::create(dir.path().join("hair/brown.png")).unwrap();
        File::create(dir.path().join("hair/black.png")).unwrap();
        File::create(dir.path().join("hair/notes.txt")).unwrap();
        File::create(dir.path().join("top/hoodie.png")).unwrap();
        File::create(dir.path().join("top/nested/deep.png")).unwrap();

        let store = AssetStore::new(dir.path(), "base_body/trainer_base.png");
        let inventory = store.inventory();

        assert_eq!(inventory["hair"], vec!["black", "brown"]);
        assert!(inventory["cap"].is_empty());
        assert_eq!(inventory["top"], vec!["hoodie"]);
    }
}
