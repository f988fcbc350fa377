use image::DynamicImage;
use std::sync::{Arc, Mutex};

use super::provider::{create_provider, EncodedImage, VisionModel};
use crate::config::LlmConfig;
use crate::error::InferenceError;

/// Shared handle to the process-wide vision model.
///
/// Cloning is cheap. When built with a gate, every call holds the same
/// mutex so the backend only ever sees one request at a time.
#[derive(Clone)]
pub struct VisionClient {
    provider: Arc<dyn VisionModel>,
    gate: Option<Arc<Mutex<()>>>,
    max_image_dimension: u32,
}

impl VisionClient {
    pub fn new(provider: Arc<dyn VisionModel>) -> Self {
        Self {
            provider,
            gate: None,
            max_image_dimension: 1024,
        }
    }

    /// Create a new VisionClient from configuration
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = Self::new(Arc::from(create_provider(config)))
            .with_max_image_dimension(config.max_image_dimension);
        if config.serialize_requests {
            client.serialized()
        } else {
            client
        }
    }

    pub fn serialized(mut self) -> Self {
        self.gate = Some(Arc::new(Mutex::new(())));
        self
    }

    pub fn with_max_image_dimension(mut self, max_image_dimension: u32) -> Self {
        self.max_image_dimension = max_image_dimension;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Encode an image once for any number of questions.
    pub fn prepare(&self, image: &DynamicImage) -> Result<EncodedImage, InferenceError> {
        EncodedImage::from_image(image, self.max_image_dimension)
    }

    /// Ask a question about the image and return the cleaned answer:
    /// prompt echo removed, trimmed, lowercased.
    pub fn ask(&self, image: &EncodedImage, prompt: &str) -> Result<String, InferenceError> {
        let raw = match &self.gate {
            Some(gate) => {
                // The mutex guards no data, so a poisoned lock is still usable
                let _slot = gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                self.provider.ask(image, prompt)?
            }
            None => self.provider.ask(image, prompt)?,
        };

        Ok(clean_answer(&raw, prompt))
    }
}

/// Some models echo the question before answering.
pub fn clean_answer(raw: &str, prompt: &str) -> String {
    raw.replace(prompt, "").trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    struct EchoModel;

    impl VisionModel for EchoModel {
        fn ask(&self, _image: &EncodedImage, prompt: &str) -> Result<String, InferenceError> {
            Ok(format!("{}  Brown \n", prompt))
        }

        fn provider_name(&self) -> &'static str {
            "echo"
        }
    }

    /// Records the highest number of calls in flight at once.
    #[derive(Default)]
    struct SlowModel {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl VisionModel for SlowModel {
        fn ask(&self, _image: &EncodedImage, _prompt: &str) -> Result<String, InferenceError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("black".to_string())
        }

        fn provider_name(&self) -> &'static str {
            "slow"
        }
    }

    fn tiny_image(client: &VisionClient) -> EncodedImage {
        client
            .prepare(&DynamicImage::ImageRgba8(RgbaImage::new(2, 2)))
            .unwrap()
    }

    #[test]
    fn test_clean_answer_strips_echo() {
        assert_eq!(clean_answer("What color? Red", "What color?"), "red");
        assert_eq!(clean_answer("  BLUE\n", "What color?"), "blue");
        assert_eq!(clean_answer("", "What color?"), "");
    }

    #[test]
    fn test_ask_cleans_provider_output() {
        let client = VisionClient::new(Arc::new(EchoModel));
        let image = tiny_image(&client);
        let answer = client.ask(&image, "What is the hair color?").unwrap();
        assert_eq!(answer, "brown");
    }

    #[test]
    fn test_serialized_client_runs_one_call_at_a_time() {
        let model = Arc::new(SlowModel::default());
        let client = VisionClient::new(model.clone()).serialized();
        let image = tiny_image(&client);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let client = client.clone();
                let image = image.clone();
                thread::spawn(move || client.ask(&image, "q").unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "black");
        }

        assert_eq!(model.peak.load(Ordering::SeqCst), 1);
    }
}
