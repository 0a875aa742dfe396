//! Provider router — selects the LLM provider based on config.
//!
//! Every supported backend speaks the OpenAI chat-completions dialect, so the
//! router only needs to resolve a base URL and API key per provider name.

use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::RetryProvider;
use deepsearch_config::AppConfig;
use deepsearch_core::error::ProviderError;
use deepsearch_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get the default provider or a `NotConfigured` error naming it.
    pub fn require_default(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        self.default().ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "no base URL known for provider '{}'; set providers.{}.api_url",
                self.default_provider, self.default_provider
            ))
        })
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration, each wrapped in the configured retry policy.
///
/// Providers with no explicit `api_url` and no well-known default are skipped.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let Some(base_url) = provider_config
            .api_url
            .clone()
            .or_else(|| default_base_url(name))
        else {
            tracing::warn!(provider = %name, "Skipping provider with no known base URL");
            continue;
        };

        router.register(name.clone(), wrap(config, name, &base_url, &api_key));
    }

    // Ensure the default provider exists even if not explicitly configured
    if router.get(&config.default_provider).is_none() {
        if let Some(base_url) = default_base_url(&config.default_provider) {
            let api_key = config.api_key.clone().unwrap_or_default();
            let provider = wrap(config, &config.default_provider, &base_url, &api_key);
            router.register(config.default_provider.clone(), provider);
        }
    }

    router
}

fn wrap(config: &AppConfig, name: &str, base_url: &str, api_key: &str) -> Arc<dyn Provider> {
    let inner: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::new(name, base_url, api_key));
    Arc::new(RetryProvider::from_config(inner, &config.retry))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        "ollama" => "http://localhost:11434/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "fireworks" => "https://api.fireworks.ai/inference/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.to_string())
}
