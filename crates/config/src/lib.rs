//! Configuration loading, validation, and management for DeepSearch.
//!
//! Loads configuration from `~/.deepsearch/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.deepsearch/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the default LLM provider (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Temperature used by the answer composer
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Research loop settings
    #[serde(default)]
    pub research: ResearchConfig,

    /// Web search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Page scraping settings
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Retry policy for LLM calls
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "google/gemini-2.0-flash-001".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("research", &self.research)
            .field("search", &self.search)
            .field("scrape", &self.scrape)
            .field("retry", &self.retry)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

/// Settings for the research loop itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Search/scrape actions allowed before a forced answer
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Results requested per search
    #[serde(default = "default_search_result_count")]
    pub search_result_count: usize,

    /// Maximum page fetches in flight within one scrape action
    #[serde(default = "default_scrape_concurrency")]
    pub scrape_concurrency: usize,

    /// Temperature for the decision oracle
    #[serde(default)]
    pub decision_temperature: f32,
}

fn default_max_steps() -> u32 {
    10
}
fn default_search_result_count() -> usize {
    10
}
fn default_scrape_concurrency() -> usize {
    6
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            search_result_count: default_search_result_count(),
            scrape_concurrency: default_scrape_concurrency(),
            decision_temperature: 0.0,
        }
    }
}

/// Serper.dev search settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_url")]
    pub api_url: String,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_search_url() -> String {
    "https://google.serper.dev".into()
}
fn default_search_timeout() -> u64 {
    15
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_search_url(),
            timeout_secs: default_search_timeout(),
        }
    }
}

/// Page fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_scrape_timeout")]
    pub timeout_secs: u64,

    /// Page text beyond this many characters is cut off
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Response bodies are read up to this many bytes; the rest is discarded
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_scrape_timeout() -> u64 {
    20
}
fn default_max_content_chars() -> usize {
    20_000
}
fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}
fn default_user_agent() -> String {
    concat!("deepsearch/", env!("CARGO_PKG_VERSION")).into()
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scrape_timeout(),
            max_content_chars: default_max_content_chars(),
            max_body_bytes: default_max_body_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

/// Bounded exponential backoff for LLM calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first (1 = no retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    8_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.deepsearch/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `DEEPSEARCH_API_KEY`, then `OPENROUTER_API_KEY`, then `OPENAI_API_KEY`
    /// - `DEEPSEARCH_PROVIDER`, `DEEPSEARCH_MODEL`
    /// - `SERPER_API_KEY`, `SEARCH_RESULTS_COUNT`
    /// - `DEEPSEARCH_MAX_STEPS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("DEEPSEARCH_API_KEY")
            .or_else(|| self.api_key.clone())
            .or_else(|| lookup("OPENROUTER_API_KEY"))
            .or_else(|| lookup("OPENAI_API_KEY"))
        {
            self.api_key = Some(key);
        }

        if let Some(provider) = lookup("DEEPSEARCH_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("DEEPSEARCH_MODEL") {
            self.default_model = model;
        }

        if let Some(key) = lookup("SERPER_API_KEY") {
            self.search.api_key = Some(key);
        }

        if let Some(count) = lookup("SEARCH_RESULTS_COUNT") {
            self.research.search_result_count = count.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "SEARCH_RESULTS_COUNT must be a positive integer, got '{count}'"
                ))
            })?;
        }

        if let Some(steps) = lookup("DEEPSEARCH_MAX_STEPS") {
            self.research.max_steps = steps.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "DEEPSEARCH_MAX_STEPS must be a non-negative integer, got '{steps}'"
                ))
            })?;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deepsearch")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.research.decision_temperature < 0.0 || self.research.decision_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "research.decision_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.research.search_result_count == 0 || self.research.search_result_count > 100 {
            return Err(ConfigError::ValidationError(
                "research.search_result_count must be between 1 and 100".into(),
            ));
        }

        if self.research.scrape_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "research.scrape_concurrency must be at least 1".into(),
            ));
        }

        if self.scrape.max_body_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "scrape.max_body_bytes must be at least 1".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an LLM API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Check if a search API key is available.
    pub fn has_search_key(&self) -> bool {
        self.search.api_key.is_some()
    }

    /// A copy with every secret replaced by a mask, safe to print.
    pub fn redacted(&self) -> Self {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "***".to_string());
        let mut config = self.clone();
        config.api_key = mask(&self.api_key);
        config.search.api_key = mask(&self.search.api_key);
        for provider in config.providers.values_mut() {
            provider.api_key = mask(&provider.api_key);
        }
        config
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            research: ResearchConfig::default(),
            search: SearchConfig::default(),
            scrape: ScrapeConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
