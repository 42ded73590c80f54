//! Configuration loading and validation.

use super::Config;
use crate::env;
use crate::error::ConfigError;
use crate::paths;
use crate::secret::SecretString;
use std::fs;
use std::path::{Path, PathBuf};

impl Config {
    /// Resolve the config path: `$SHOPASSIST_CONFIG`, else the default location.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        match env::get_var(env::vars::SHOPASSIST_CONFIG) {
            Some(path) => Ok(paths::expand_tilde(&path)),
            None => paths::config_file(),
        }
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Load the config at `path` (or the default path), tolerating a missing
    /// file, then apply environment overrides and validate.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        let mut config = match Self::load(&path) {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from the environment onto the loaded file.
    pub fn apply_env(&mut self) {
        if let Some(key) = env::get_var(env::vars::OPENAI_API_KEY) {
            self.openai.api_key = Some(SecretString::new(key));
        }
        if let Some(token) = env::get_var(env::vars::SHOPASSIST_ADMIN_TOKEN) {
            self.gateway.admin_token = Some(SecretString::new(token));
        }
        if let Some(url) = env::get_var(env::vars::SHOPASSIST_DATABASE_URL) {
            self.database.url = url;
        }
        if let Some(port) = env::get_u16(env::vars::SHOPASSIST_PORT) {
            self.gateway.port = port;
        }
    }

    /// Serialize to a JSON5-compatible string. Secrets are redacted.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.gateway.port == 0 {
            errors.push("Gateway port cannot be 0".to_string());
        }

        if !self.database.is_memory() && !self.database.url.starts_with("sqlite:") {
            errors.push(format!(
                "Database url '{}' must start with 'sqlite:' or be 'memory'",
                self.database.url
            ));
        }
        if self.database.max_connections == 0 {
            errors.push("Database max_connections must be greater than 0".to_string());
        }

        if let Err(e) = url::Url::parse(&self.openai.base_url) {
            errors.push(format!(
                "OpenAI base_url '{}' is not a valid URL: {}",
                self.openai.base_url, e
            ));
        }
        if self.openai.timeout_secs == 0 {
            errors.push("OpenAI timeout_secs must be greater than 0".to_string());
        }

        if self.embeddings.model.trim().is_empty() {
            errors.push("Embedding model must not be empty".to_string());
        }
        if self.embeddings.dimensions == 0 {
            errors.push("Embedding dimensions must be greater than 0".to_string());
        }
        if self.embeddings.batch_size == 0 || self.embeddings.regenerate_batch_size == 0 {
            errors.push("Embedding batch sizes must be greater than 0".to_string());
        }

        if self.assistant.model.trim().is_empty() {
            errors.push("Assistant model must not be empty".to_string());
        }
        if !(1..=10).contains(&self.assistant.max_steps) {
            errors.push(format!(
                "Assistant max_steps must be 1-10, got {}",
                self.assistant.max_steps
            ));
        }
        if !(0.0..=2.0).contains(&self.assistant.temperature) {
            errors.push(format!(
                "Assistant temperature must be 0.0-2.0, got {}",
                self.assistant.temperature
            ));
        }
        if self.assistant.default_max_results == 0 {
            errors.push("Assistant default_max_results must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }

    /// Filesystem path of the SQLite database, with `~` expanded.
    ///
    /// Returns `None` for the in-memory backend.
    pub fn database_path(&self) -> Option<PathBuf> {
        if self.database.is_memory() {
            return None;
        }
        let raw = self
            .database
            .url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        Some(paths::expand_tilde(raw))
    }
}
