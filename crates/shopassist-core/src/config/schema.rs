//! Configuration schema definitions.

use crate::secret::SecretString;
use serde::{Deserialize, Serialize};

/// Main ShopAssist configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Persistence settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// OpenAI API access, shared by completions and embeddings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Embedding generation settings.
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    /// Conversational assistant settings.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bind mode.
    #[serde(default)]
    pub bind: BindMode,

    /// Port number.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token that grants store-owner (admin) access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<SecretString>,

    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: BindMode::default(),
            port: default_port(),
            admin_token: None,
            cors_origins: Vec::new(),
        }
    }
}

fn default_port() -> u16 {
    3458
}

/// Bind mode for the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Bind to loopback only (127.0.0.1).
    #[default]
    Loopback,

    /// Bind to all interfaces (0.0.0.0).
    Lan,
}

impl BindMode {
    /// The IP address this mode binds to.
    pub fn ip(&self) -> [u8; 4] {
        match self {
            Self::Loopback => [127, 0, 0, 1],
            Self::Lan => [0, 0, 0, 0],
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `sqlite://path/to/file.db`, or `memory` for the in-process backend.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// Check if the in-memory backend is selected.
    pub fn is_memory(&self) -> bool {
        self.url.eq_ignore_ascii_case("memory")
    }
}

fn default_database_url() -> String {
    "sqlite://~/.shopassist/shopassist.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

/// OpenAI API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key. Falls back to `OPENAI_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<SecretString>,

    /// API base URL.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl OpenAiConfig {
    /// The configured API key, if it is non-empty.
    pub fn credential(&self) -> Option<&SecretString> {
        self.api_key.as_ref().filter(|k| !k.is_empty())
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Embedding generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector dimensionality produced by the model.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Products embedded per `generate` run.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Products embedded per pass while regenerating a whole store.
    #[serde(default = "default_regenerate_batch_size")]
    pub regenerate_batch_size: usize,

    /// Delay between embedding calls, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            regenerate_batch_size: default_regenerate_batch_size(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_batch_size() -> usize {
    50
}

fn default_regenerate_batch_size() -> usize {
    20
}

fn default_delay_ms() -> u64 {
    600
}

/// Assistant configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Name the assistant introduces itself with.
    #[serde(default = "default_assistant_name")]
    pub name: String,

    /// Chat completion model.
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per completion step.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Hard ceiling on completion steps per chat turn.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Product titles sampled into the system prompt.
    #[serde(default = "default_sample_products")]
    pub sample_products: usize,

    /// Product categories sampled into the system prompt.
    #[serde(default = "default_sample_categories")]
    pub sample_categories: usize,

    /// Result cap used when the model omits `maxResults`.
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_steps: default_max_steps(),
            sample_products: default_sample_products(),
            sample_categories: default_sample_categories(),
            default_max_results: default_max_results(),
        }
    }
}

fn default_assistant_name() -> String {
    "Shopping Assistant".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_max_steps() -> usize {
    3
}

fn default_sample_products() -> usize {
    5
}

fn default_sample_categories() -> usize {
    10
}

fn default_max_results() -> usize {
    5
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}
