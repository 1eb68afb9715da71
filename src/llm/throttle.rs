//! Throttling decorator: one rate-limiter permit per model call.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

use super::client::ModelClient;
use super::limiter::{RateLimiter, RateLimiterStatus};
use super::types::{CompletionRequest, CompletionResponse};

/// Wraps a model client so every call holds a [`RateLimiter`] permit for its
/// duration. The permit is a drop guard, so it is released on success,
/// error, cancellation, and unwind alike.
pub struct ThrottledClient<C> {
    inner: Arc<C>,
    limiter: Arc<RateLimiter>,
}

impl<C: ModelClient> ThrottledClient<C> {
    pub fn new(inner: C, limiter: Arc<RateLimiter>) -> Self {
        Self {
            inner: Arc::new(inner),
            limiter,
        }
    }

    pub fn from_arc(inner: Arc<C>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    /// Limiter state for diagnostics.
    pub async fn limiter_status(&self) -> RateLimiterStatus {
        self.limiter.status().await
    }
}

#[async_trait]
impl<C: ModelClient> ModelClient for ThrottledClient<C> {
    async fn complete(
        &self,
        cancel: &CancellationToken,
        request: CompletionRequest,
    ) -> Result<CompletionResponse> {
        let _permit = self.limiter.acquire(cancel).await?;
        self.inner.complete(cancel, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct EchoClient;

    #[async_trait]
    impl ModelClient for EchoClient {
        async fn complete(
            &self,
            _cancel: &CancellationToken,
            request: CompletionRequest,
        ) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                content: request.prompt,
                tokens_used: 1,
                prompt_version: "1.0".to_string(),
                model: "mock".to_string(),
            })
        }
    }

    struct FailingClient;

    #[async_trait]
    impl ModelClient for FailingClient {
        async fn complete(
            &self,
            _cancel: &CancellationToken,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse> {
            Err(Error::Api("boom".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_released_after_success() {
        let limiter = Arc::new(RateLimiter::new(10, 2));
        let client = ThrottledClient::new(EchoClient, Arc::clone(&limiter));
        let cancel = CancellationToken::new();

        let response = client
            .complete(&cancel, CompletionRequest::new("hello"))
            .await
            .unwrap();
        assert_eq!(response.content, "hello");

        let status = client.limiter_status().await;
        assert_eq!(status.in_flight, 0);
        assert_eq!(status.available_tokens, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_released_after_failure() {
        let limiter = Arc::new(RateLimiter::new(10, 2));
        let client = ThrottledClient::new(FailingClient, Arc::clone(&limiter));
        let cancel = CancellationToken::new();

        let result = client
            .complete(&cancel, CompletionRequest::new("hello"))
            .await;
        assert!(matches!(result, Err(Error::Api(_))));
        assert_eq!(client.limiter_status().await.in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_admission() {
        let limiter = Arc::new(RateLimiter::new(10, 2));
        let client = ThrottledClient::new(EchoClient, limiter);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client
            .complete(&cancel, CompletionRequest::new("hello"))
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(client.limiter_status().await.in_flight, 0);
    }
}
