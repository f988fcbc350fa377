use image::DynamicImage;
use std::sync::Arc;

use super::{Attribute, FeatureSet, LabelMatcher, VocabularyMatcher};
use crate::error::InferenceError;
use crate::llm::{EncodedImage, VisionClient};

/// Classifies hair color, cap color and top style by asking the vision
/// model one fixed question per attribute.
#[derive(Clone)]
pub struct AttributeExtractor {
    client: VisionClient,
    matcher: Arc<dyn LabelMatcher>,
}

impl AttributeExtractor {
    pub fn new(client: VisionClient) -> Self {
        Self {
            client,
            matcher: Arc::new(VocabularyMatcher),
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn LabelMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn client(&self) -> &VisionClient {
        &self.client
    }

    /// Blocks for three sequential inference calls: hair, cap, top.
    pub fn extract(&self, image: &DynamicImage) -> Result<FeatureSet, InferenceError> {
        let encoded = self.client.prepare(image)?;

        // Field initializers evaluate in source order
        Ok(FeatureSet {
            hair_color: self.classify(&encoded, Attribute::HairColor)?,
            cap_color: self.classify(&encoded, Attribute::CapColor)?,
            top_style: self.classify(&encoded, Attribute::TopStyle)?,
        })
    }

    fn classify(
        &self,
        image: &EncodedImage,
        attribute: Attribute,
    ) -> Result<String, InferenceError> {
        let answer = self.client.ask(image, attribute.prompt())?;
        let label = self.matcher.match_label(attribute, &answer);
        tracing::debug!(
            attribute = %attribute,
            answer = %answer,
            label = %label,
            "Classified attribute"
        );
        Ok(label)
    }
}
