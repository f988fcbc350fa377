use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub assets: AssetConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Scratch directory for per-request sprite output.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_output_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("trainer-sprite/sprites")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    LmStudio,
    OpenAI,
    Anthropic,
    #[default]
    Ollama,
}

impl LlmProviderType {
    /// Where the provider listens when `llm.endpoint` is not set.
    pub fn default_endpoint(self) -> &'static str {
        match self {
            LlmProviderType::LmStudio => "http://127.0.0.1:1234/v1",
            LlmProviderType::OpenAI => "https://api.openai.com/v1",
            LlmProviderType::Anthropic => "https://api.anthropic.com/v1",
            LlmProviderType::Ollama => "http://localhost:11434",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderType,

    /// Base URL of the provider API. Unset means the provider's usual
    /// local or hosted address.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Upper bound on generated tokens per answer. Answers are one word.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Images larger than this on either side are downscaled before upload.
    #[serde(default = "default_max_image_dimension")]
    pub max_image_dimension: u32,

    /// Route every inference call through a single slot, for backends that
    /// cannot serve concurrent requests.
    #[serde(default)]
    pub serialize_requests: bool,
}

fn default_llm_model() -> String {
    "llava:7b".to_string()
}

fn default_max_tokens() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_image_dimension() -> u32 {
    1024
}

impl LlmConfig {
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderType::default(),
            endpoint: None,
            model: default_llm_model(),
            api_key: None,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_image_dimension: default_max_image_dimension(),
            serialize_requests: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    #[serde(default = "default_asset_root")]
    pub root: PathBuf,

    /// Base body image, relative to `root`.
    #[serde(default = "default_base_asset")]
    pub base: PathBuf,
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("assets")
}

fn default_base_asset() -> PathBuf {
    PathBuf::from("base_body/trainer_base.png")
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: default_asset_root(),
            base: default_base_asset(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Directory for rolling log files when journald is unavailable.
    /// Logs go to stderr when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            assets: AssetConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing a default config there if
    /// none exists yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// `TRAINER_SPRITE_CONFIG` if set, otherwise the per-user config dir.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("TRAINER_SPRITE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trainer-sprite")
            .join("config.toml")
    }

    /// Absolute or root-relative path of the base body asset.
    pub fn base_asset_path(&self) -> PathBuf {
        self.assets.root.join(&self.assets.base)
    }
}
