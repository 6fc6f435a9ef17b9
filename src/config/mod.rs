mod loader;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::prompt::{PromptBudget, PromptFormatKind};

pub use loader::load_config;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Chat server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Backend llama-server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Full backend URL (e.g., "https://example.com:4234" or "http://localhost:8080")
    pub url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// TLS configuration options
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// API key for backend authentication
    #[serde(default)]
    pub api_key: Option<String>,
}

/// TLS configuration for backend connections
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Accept invalid certificates (self-signed, expired)
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Path to custom CA certificate (PEM format)
    pub ca_cert_path: Option<String>,
    /// Path to client certificate for mTLS
    pub client_cert_path: Option<String>,
    /// Path to client private key for mTLS
    pub client_key_path: Option<String>,
}

fn default_timeout() -> u64 {
    300
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            timeout_seconds: default_timeout(),
            tls: None,
            api_key: None,
        }
    }
}

impl BackendConfig {
    /// Returns the base URL with trailing slash stripped
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Returns true if the URL uses HTTPS
    pub fn is_tls(&self) -> bool {
        self.url.to_lowercase().starts_with("https://")
    }
}

/// Model generation parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Total context window of the target model, in tokens
    #[serde(default = "default_context_window")]
    pub context_window_tokens: usize,
    /// Tokens reserved for the completion; never available to the prompt
    #[serde(default = "default_reserved_completion")]
    pub reserved_completion_tokens: usize,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,
    /// Ask the backend to reuse its prompt cache across requests
    #[serde(default = "default_cache_prompt")]
    pub cache_prompt: bool,
    /// Prompt format family (llama2, chatml)
    #[serde(default)]
    pub format: PromptFormatKind,
    /// Characters per token used by the heuristic counter
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
}

fn default_context_window() -> usize {
    4096
}

fn default_reserved_completion() -> usize {
    512
}

fn default_cache_prompt() -> bool {
    true
}

fn default_chars_per_token() -> usize {
    4
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            context_window_tokens: default_context_window(),
            reserved_completion_tokens: default_reserved_completion(),
            temperature: 0.0,
            cache_prompt: default_cache_prompt(),
            format: PromptFormatKind::default(),
            chars_per_token: default_chars_per_token(),
        }
    }
}

impl ModelConfig {
    /// Token budget derived from the configured window and reservation
    pub fn budget(&self) -> PromptBudget {
        PromptBudget {
            context_window_tokens: self.context_window_tokens,
            reserved_completion_tokens: self.reserved_completion_tokens,
        }
    }
}

/// System instruction configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptConfig {
    /// System instruction anchoring assistant behavior; never trimmed
    #[serde(default = "default_system_instruction")]
    pub system: String,
}

fn default_system_instruction() -> String {
    "You are an AI chat bot. Follow the user's instructions carefully.".to_string()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system: default_system_instruction(),
        }
    }
}

/// Stats logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub format: StatsFormat,
}

fn default_stats_enabled() -> bool {
    true
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: default_stats_enabled(),
            format: StatsFormat::default(),
        }
    }
}

/// Stats output format
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StatsFormat {
    #[default]
    Compact,
    Json,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to default path
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) => Self::from_file(path),
            None => {
                // Try default locations
                let default_paths = ["config.yaml", "config.yml", "./config/config.yaml"];
                for p in default_paths {
                    let path = Path::new(p);
                    if path.exists() {
                        return Self::from_file(path);
                    }
                }
                Err(ConfigError::NotFound(
                    "No config file found. Tried: config.yaml, config.yml, ./config/config.yaml"
                        .to_string(),
                ))
            }
        }
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.backend.url).is_err() {
            return Err(ConfigError::Validation(format!(
                "backend.url is not a valid URL: {}",
                self.backend.url
            )));
        }
        if self.model.context_window_tokens == 0 {
            return Err(ConfigError::Validation(
                "model.context_window_tokens must be greater than zero".to_string(),
            ));
        }
        if self.model.reserved_completion_tokens >= self.model.context_window_tokens {
            return Err(ConfigError::Validation(format!(
                "model.reserved_completion_tokens ({}) must be smaller than model.context_window_tokens ({})",
                self.model.reserved_completion_tokens, self.model.context_window_tokens
            )));
        }
        if self.model.chars_per_token == 0 {
            return Err(ConfigError::Validation(
                "model.chars_per_token must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
