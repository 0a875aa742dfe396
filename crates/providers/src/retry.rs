//! Provider retry — bounded exponential backoff for transient failures.
//!
//! Wraps a single provider and retries rate limits, timeouts, network errors,
//! and 5xx responses. Permanent failures (bad key, unknown model, 4xx) are
//! returned on the first attempt. Only stream *establishment* is retried; once
//! chunks are flowing, an interruption is surfaced to the consumer.

use async_trait::async_trait;
use deepsearch_config::RetryConfig;
use deepsearch_core::error::ProviderError;
use deepsearch_core::provider::*;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A provider that retries transient failures of an inner provider.
pub struct RetryProvider {
    inner: Arc<dyn deepsearch_core::Provider>,
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryProvider {
    /// Wrap a provider with the default policy (3 attempts, 500ms doubling up to 8s).
    pub fn new(inner: Arc<dyn deepsearch_core::Provider>) -> Self {
        Self {
            inner,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }

    /// Wrap a provider with the policy from the `[retry]` config section.
    pub fn from_config(inner: Arc<dyn deepsearch_core::Provider>, config: &RetryConfig) -> Self {
        Self {
            inner,
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `attempt` (1-based), honoring `retry-after`.
    fn backoff_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        let exp = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let delay = exp.min(self.max_backoff);
        match error {
            ProviderError::RateLimited { retry_after_secs } => {
                delay.max(Duration::from_secs(*retry_after_secs).min(self.max_backoff))
            }
            _ => delay,
        }
    }

    async fn with_retries<T, F, Fut>(
        &self,
        op: &'static str,
        mut call: F,
    ) -> std::result::Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(provider = %self.inner.name(), op, attempt, "Retry succeeded");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff_for(attempt, &e);
                    warn!(
                        provider = %self.inner.name(),
                        op,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl deepsearch_core::Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        self.with_retries("complete", || self.inner.complete(request.clone()))
            .await
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        self.with_retries("stream", || self.inner.stream(request.clone()))
            .await
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
