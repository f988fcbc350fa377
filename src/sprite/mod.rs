//! Layered sprite composition over the on-disk asset store.

pub mod assets;
pub mod composer;

pub use assets::{overlay_path, AssetStore};
pub use composer::{Composition, LayerOutcome, SkipReason, SpriteComposer};
