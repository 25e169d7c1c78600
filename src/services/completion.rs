//! Retry and timeout policy around a completion provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CompletionError;
use crate::models::OpenAIConfig;
use crate::services::provider::{ChatMessage, CompletionProvider};
use crate::utils::{RetryConfig, with_retry};

/// Wraps a provider so that every call gets a bounded number of attempts,
/// each with its own timeout. An empty reply counts as a failed attempt.
pub struct RetryingCompleter {
    inner: Arc<dyn CompletionProvider>,
    retry: RetryConfig,
    timeout: Duration,
}

impl RetryingCompleter {
    pub fn new(inner: Arc<dyn CompletionProvider>, config: &OpenAIConfig) -> Self {
        Self {
            inner,
            retry: RetryConfig::new(config.max_attempts),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CompletionProvider for RetryingCompleter {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let timeout = self.timeout;
        let inner = &self.inner;

        with_retry(&self.retry, |attempt| async move {
            debug!(attempt, "requesting completion");
            match tokio::time::timeout(timeout, inner.complete(messages)).await {
                Err(_) => Err(CompletionError::Timeout(timeout.as_secs())),
                Ok(Err(e)) => Err(e),
                Ok(Ok(text)) if text.trim().is_empty() => Err(CompletionError::EmptyResponse),
                Ok(Ok(text)) => Ok(text),
            }
        })
        .await
        .into_result_with(CompletionError::ExhaustedRetries)
    }
}
