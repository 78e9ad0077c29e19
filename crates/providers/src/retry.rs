//! Caller-side retry for transient upstream failures.
//!
//! Only errors that `ProviderError::is_retryable` marks as transient are
//! retried, with exponential backoff capped at `max_delay_ms`. Rejections
//! and malformed responses surface immediately.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tellerbot_core::error::ProviderError;
use tellerbot_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 200,
            max_delay_ms: 2000,
            multiplier: 2.0,
        }
    }
}

/// Backoff state for one operation.
pub struct RetryPolicy {
    config: RetryConfig,
    current_attempt: usize,
    current_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            current_delay_ms: config.initial_delay_ms,
            current_attempt: 0,
            config,
        }
    }

    /// Delay before the next retry, or `None` once retries are used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.current_attempt >= self.config.max_retries {
            return None;
        }

        let delay = Duration::from_millis(self.current_delay_ms.min(self.config.max_delay_ms));
        self.current_attempt += 1;

        self.current_delay_ms = ((self.current_delay_ms as f64) * self.config.multiplier)
            .min(self.config.max_delay_ms as f64) as u64;

        Some(delay)
    }

    /// Retries taken so far.
    pub fn attempt(&self) -> usize {
        self.current_attempt
    }
}

/// Run `operation`, retrying transient provider errors.
pub async fn with_retry<F, Fut, T>(mut operation: F, config: &RetryConfig) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut policy = RetryPolicy::new(config.clone());

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if let Some(delay) = policy.next_delay() {
                    warn!(
                        attempt = policy.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        kind = e.kind(),
                        error = %e,
                        "Upstream call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    debug!(retries = policy.attempt(), error = %e, "Upstream call failed after all retries");
                    return Err(e);
                }
            }
        }
    }
}

/// A provider decorator that applies [`with_retry`] to every completion.
pub struct RetryingProvider {
    inner: Arc<dyn Provider>,
    config: RetryConfig,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn Provider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        with_retry(|| self.inner.complete(request.clone()), &self.config).await
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }
}
