//! Classify a photo's hair color, cap color and top style with a vision
//! model, and composite a layered trainer sprite from the result.

pub mod config;
pub mod error;
pub mod features;
pub mod llm;
pub mod logging;
pub mod server;
pub mod sprite;

pub use error::{Error, InferenceError, Result};
pub use features::{Attribute, AttributeExtractor, FeatureSet};
pub use llm::{VisionClient, VisionModel};
pub use sprite::SpriteComposer;
