use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;

use crate::error::InferenceError;

/// An image prepared once for upload to a vision model.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub base64: String,
    pub mime_type: &'static str,
}

impl EncodedImage {
    /// Downscale if either side exceeds `max_dimension`, then re-encode as JPEG.
    pub fn from_image(img: &DynamicImage, max_dimension: u32) -> Result<Self, InferenceError> {
        let (width, height) = img.dimensions();
        let img = if width > max_dimension || height > max_dimension {
            img.resize(
                max_dimension,
                max_dimension,
                image::imageops::FilterType::Triangle,
            )
        } else {
            img.clone()
        };

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

        let mut buf = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut buf, 85);
        rgb.write_with_encoder(encoder)
            .map_err(|e| InferenceError::Encode(e.to_string()))?;

        Ok(Self {
            base64: BASE64.encode(buf.into_inner()),
            mime_type: "image/jpeg",
        })
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// Generation settings shared by every provider.
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 10,
            timeout: Duration::from_secs(120),
        }
    }
}

/// A vision-language model that answers a question about an image.
///
/// Calls block until the model answers. Implementations decode greedily so
/// the same (image, prompt) pair yields the same answer.
pub trait VisionModel: Send + Sync {
    fn ask(&self, image: &EncodedImage, prompt: &str) -> Result<String, InferenceError>;

    /// Get the provider name for display
    fn provider_name(&self) -> &'static str;
}

fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

fn classify_ureq_error(err: ureq::Error) -> InferenceError {
    match err {
        ureq::Error::Status(status, response) => InferenceError::Rejected {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => InferenceError::Unavailable(transport.to_string()),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(
    response: ureq::Response,
) -> Result<T, InferenceError> {
    response
        .into_json()
        .map_err(|e| InferenceError::BadResponse(e.to_string()))
}

// ============================================================================
// OpenAI-compatible provider (works with LM Studio, OpenAI, and compatible APIs)
// ============================================================================

pub struct OpenAICompatibleProvider {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    options: GenerationOptions,
}

#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: Vec<OpenAIContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum OpenAIContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

impl OpenAIChatResponse {
    /// Text of the first choice. A `null` content is a malformed reply,
    /// not an empty answer.
    fn into_answer(self) -> Result<String, InferenceError> {
        self.choices
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::BadResponse("no choices in response".to_string()))?
            .message
            .content
            .ok_or_else(|| InferenceError::BadResponse("empty message content".to_string()))
    }
}

impl OpenAICompatibleProvider {
    pub fn new(endpoint: &str, model: &str, api_key: Option<&str>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.map(|s| s.to_string()),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

impl VisionModel for OpenAICompatibleProvider {
    fn ask(&self, image: &EncodedImage, prompt: &str) -> Result<String, InferenceError> {
        let request = OpenAIChatRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: vec![
                    OpenAIContentPart::Text {
                        text: prompt.to_string(),
                    },
                    OpenAIContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_url(),
                        },
                    },
                ],
            }],
            max_tokens: self.options.max_tokens,
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.endpoint);

        let mut req = agent(self.options.timeout)
            .post(&url)
            .set("Content-Type", "application/json");

        if let Some(ref api_key) = self.api_key {
            req = req.set("Authorization", &format!("Bearer {}", api_key));
        }

        let response = req.send_json(&request).map_err(classify_ureq_error)?;
        let chat_response: OpenAIChatResponse = parse_json(response)?;
        chat_response.into_answer()
    }

    fn provider_name(&self) -> &'static str {
        "OpenAI-compatible"
    }
}

// ============================================================================
// Anthropic Claude provider
// ============================================================================

pub struct AnthropicProvider {
    endpoint: String,
    api_key: String,
    model: String,
    options: GenerationOptions,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum AnthropicContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: AnthropicImageSource },
}

#[derive(Debug, Serialize)]
struct AnthropicImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponseContent {
    text: Option<String>,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, model: Option<&str>) -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1".to_string(),
            api_key: api_key.to_string(),
            model: model.unwrap_or("claude-sonnet-4-20250514").to_string(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

impl VisionModel for AnthropicProvider {
    fn ask(&self, image: &EncodedImage, prompt: &str) -> Result<String, InferenceError> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.options.max_tokens,
            temperature: 0.0,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: vec![
                    AnthropicContent::Image {
                        source: AnthropicImageSource {
                            source_type: "base64".to_string(),
                            media_type: image.mime_type.to_string(),
                            data: image.base64.clone(),
                        },
                    },
                    AnthropicContent::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
        };

        let url = format!("{}/messages", self.endpoint);

        let response = agent(self.options.timeout)
            .post(&url)
            .set("Content-Type", "application/json")
            .set("x-api-key", &self.api_key)
            .set("anthropic-version", "2023-06-01")
            .send_json(&request)
            .map_err(classify_ureq_error)?;

        let anthropic_response: AnthropicResponse = parse_json(response)?;

        anthropic_response
            .content
            .into_iter()
            .find_map(|c| c.text)
            .ok_or_else(|| InferenceError::BadResponse("no text block in response".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "Anthropic Claude"
    }
}

// ============================================================================
// Ollama provider
// ============================================================================

pub struct OllamaProvider {
    endpoint: String,
    model: String,
    options: GenerationOptions,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    images: Vec<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaProvider {
    pub fn new(endpoint: Option<&str>, model: &str) -> Self {
        Self {
            endpoint: endpoint
                .unwrap_or("http://localhost:11434")
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

impl VisionModel for OllamaProvider {
    fn ask(&self, image: &EncodedImage, prompt: &str) -> Result<String, InferenceError> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            images: vec![image.base64.clone()],
            stream: false,
            options: OllamaOptions {
                temperature: 0.0,
                num_predict: self.options.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.endpoint);

        let response = agent(self.options.timeout)
            .post(&url)
            .set("Content-Type", "application/json")
            .send_json(&request)
            .map_err(classify_ureq_error)?;

        let ollama_response: OllamaResponse = parse_json(response)?;

        Ok(ollama_response.response)
    }

    fn provider_name(&self) -> &'static str {
        "Ollama"
    }
}

// ============================================================================
// Factory function
// ============================================================================

use crate::config::{LlmConfig, LlmProviderType};

/// Create a vision model provider based on configuration
pub fn create_provider(config: &LlmConfig) -> Box<dyn VisionModel> {
    let options = GenerationOptions {
        max_tokens: config.max_tokens,
        timeout: Duration::from_secs(config.timeout_secs),
    };

    match config.provider {
        LlmProviderType::LmStudio | LlmProviderType::OpenAI => Box::new(
            OpenAICompatibleProvider::new(
                config.endpoint(),
                &config.model,
                config.api_key.as_deref(),
            )
            .with_options(options),
        ),
        LlmProviderType::Anthropic => {
            let api_key = config.api_key.as_deref().unwrap_or("");
            Box::new(
                AnthropicProvider::new(api_key, Some(&config.model))
                    .with_endpoint(config.endpoint())
                    .with_options(options),
            )
        }
        LlmProviderType::Ollama => Box::new(
            OllamaProvider::new(Some(config.endpoint()), &config.model).with_options(options),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn tiny_image() -> EncodedImage {
        EncodedImage::from_image(&DynamicImage::ImageRgba8(RgbaImage::new(4, 4)), 64).unwrap()
    }

    #[test]
    fn test_encode_downscales_large_images() {
        let img =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(400, 200, Rgba([10, 20, 30, 128])));
        let encoded = EncodedImage::from_image(&img, 100).unwrap();

        assert_eq!(encoded.mime_type, "image/jpeg");
        let bytes = BASE64.decode(&encoded.base64).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (100, 50));
        assert!(encoded.data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_encode_keeps_small_images() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(32, 16));
        let encoded = EncodedImage::from_image(&img, 1024).unwrap();
        let bytes = BASE64.decode(&encoded.base64).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (32, 16));
    }

    #[test]
    fn test_create_provider_by_type() {
        let mut config = LlmConfig::default();
        assert_eq!(create_provider(&config).provider_name(), "Ollama");

        config.provider = LlmProviderType::LmStudio;
        assert_eq!(create_provider(&config).provider_name(), "OpenAI-compatible");

        config.provider = LlmProviderType::Anthropic;
        assert_eq!(create_provider(&config).provider_name(), "Anthropic Claude");
    }

    #[test]
    fn test_chat_response_without_content_is_bad_response() {
        let response: OpenAIChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(matches!(
            response.into_answer(),
            Err(InferenceError::BadResponse(_))
        ));

        let response: OpenAIChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            response.into_answer(),
            Err(InferenceError::BadResponse(_))
        ));

        let response: OpenAIChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"Brown."}}]}"#).unwrap();
        assert_eq!(response.into_answer().unwrap(), "Brown.");
    }

    #[test]
    fn test_create_provider_uses_configured_endpoint() {
        let mut config = LlmConfig {
            provider: LlmProviderType::LmStudio,
            ..LlmConfig::default()
        };
        assert_eq!(config.endpoint(), "http://127.0.0.1:1234/v1");

        config.endpoint = Some("http://127.0.0.1:9/".to_string());
        config.timeout_secs = 2;
        let provider = create_provider(&config);
        let img = tiny_image();
        assert!(matches!(
            provider.ask(&img, "What is the hair color?"),
            Err(InferenceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_unreachable_endpoint_is_unavailable() {
        // Port 9 (discard) on localhost is never an Ollama server
        let provider = OllamaProvider::new(Some("http://127.0.0.1:9"), "llava").with_options(
            GenerationOptions {
                max_tokens: 10,
                timeout: Duration::from_secs(2),
            },
        );
        let img = tiny_image();

        let err = provider.ask(&img, "What is the hair color?").unwrap_err();
        assert!(matches!(err, InferenceError::Unavailable(_)));
    }
}
