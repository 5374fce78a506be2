//! Contract Analyzer - structured LLM analysis of legal contracts
//!
//! This crate provides:
//! - An upload client driving one select → submit → render cycle against `/analisar`
//! - Text extraction for PDF, DOCX and plain-text contracts
//! - LLM provider backends (OpenAI-compatible APIs and Ollama)
//! - A REST API exposing `/analisar`, `/perguntar` and `/login`
//! - Calendar export for the due dates found in an analysis
//! - PDF reports of a finished analysis

pub mod analyzer;
pub mod api;
pub mod auth;
pub mod calendar;
pub mod client;
pub mod extract;
pub mod provider;
pub mod report;
pub mod retrieval;

pub use analyzer::ContractAnalyzer;
pub use client::{UploadClient, ViewState};
pub use provider::{LlmProvider, LlmRequest, LlmResponse};

use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for the analysis server
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AnalyzerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    /// Accepted file extensions, lower-case with the leading dot
    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: Vec<String>,

    /// Language-model backend
    #[serde(default)]
    pub llm: ProviderConfig,

    /// Session and API-token settings
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_bind_addr() -> String { "0.0.0.0:8080".to_string() }
fn default_max_file_size() -> usize { 20 * 1024 * 1024 }
fn default_supported_extensions() -> Vec<String> {
    vec![".pdf".to_string(), ".docx".to_string(), ".txt".to_string()]
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_file_size: default_max_file_size(),
            supported_extensions: default_supported_extensions(),
            llm: ProviderConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

/// Configuration for the LLM provider
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProviderConfig {
    /// Provider type: "openai", "groq", "deepseek", "litellm" or "ollama"
    #[serde(default = "default_provider_type")]
    pub provider_type: String,

    /// Base URL override; each provider type has its own default
    #[serde(default)]
    pub base_url: Option<String>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Optional API key (falls back to the provider's environment variable)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sampling temperature for analysis requests
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in a completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider_type() -> String { "openai".to_string() }
fn default_model() -> String { "gpt-4o".to_string() }
fn default_temperature() -> f32 { 0.2 }
fn default_max_tokens() -> u32 { 2000 }

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            base_url: None,
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ProviderConfig {
    /// Environment variables consulted for the API key, in order
    pub fn api_key_env_vars(&self) -> &'static [&'static str] {
        match self.provider_type.as_str() {
            "openai" => &["OPENAI_API_KEY"],
            "groq" => &["GROQ_API_KEY"],
            "deepseek" => &["DEEPSEEK_API_KEY"],
            "litellm" => &["LITELLM_API_KEY", "LITELLM_MASTER_KEY"],
            _ => &[],
        }
    }
}

/// Session token settings
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AuthConfig {
    /// Reject unauthenticated calls to `/analisar` and `/perguntar`
    #[serde(default)]
    pub required: bool,

    /// HMAC secret used to sign session tokens
    #[serde(default = "default_session_secret")]
    pub session_secret: String,

    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// API token exchanged for an `admin` session
    #[serde(default)]
    pub admin_token: Option<String>,

    /// API token exchanged for a `user` session
    #[serde(default)]
    pub user_token: Option<String>,
}

pub const DEFAULT_SESSION_SECRET: &str = "change-me-session-secret";

fn default_session_secret() -> String { DEFAULT_SESSION_SECRET.to_string() }
fn default_session_ttl() -> u64 { 3600 }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            required: false,
            session_secret: default_session_secret(),
            session_ttl_secs: default_session_ttl(),
            admin_token: None,
            user_token: None,
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from a TOML file, using defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(config_path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;

        info!(config_path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Fill secrets from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Fill secrets from `lookup`; values already present in the file win
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.llm.api_key.is_none() {
            self.llm.api_key = self
                .llm
                .api_key_env_vars()
                .iter()
                .find_map(|key| lookup(*key));
        }
        if let Some(secret) = lookup("JWT_SECRET_KEY") {
            self.auth.session_secret = secret;
        }
        if self.auth.admin_token.is_none() {
            self.auth.admin_token = lookup("ADMIN_API_TOKEN");
        }
        if self.auth.user_token.is_none() {
            self.auth.user_token = lookup("USER_API_TOKEN");
        }
    }
}
