pub mod client;
pub mod provider;

pub use client::VisionClient;
pub use provider::{create_provider, EncodedImage, GenerationOptions, VisionModel};
