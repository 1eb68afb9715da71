//! Retrying decorator: backoff on rate limits, JSON enforcement, deadlines.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::error_log::{ErrorLog, ErrorRecord};
use crate::metrics::Metrics;

use super::client::ModelClient;
use super::types::{CompletionRequest, CompletionResponse, ResponseFormat};

/// Retry policy for a wrapped client.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retries after a rate-limit signal
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Upper bound on any single backoff wait
    pub max_delay: Duration,
    /// Backoff multiplier applied per retry attempt
    pub backoff_factor: f64,
    /// Per-call deadline
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(32),
            backoff_factor: 2.0,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Backoff wait before retry `attempt` (zero-based): 2s, 4s, 8s, ...
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(attempt as i32);
        let delay = self.base_delay.mul_f64(factor);
        delay.min(self.max_delay)
    }
}

/// Decorator that wraps an underlying model client with rate-limit retries
/// and JSON validity enforcement.
///
/// - A rate-limit signal is retried up to `max_retries` times with
///   exponential backoff; any other error surfaces immediately.
/// - When the request expects JSON and the content fails strict parsing,
///   the same request is reissued exactly once; a second malformed payload
///   surfaces as [`Error::JsonParse`].
/// - Every call runs under the policy deadline and surfaces
///   [`Error::Timeout`] when it elapses.
/// - A terminal failure is appended to the optional error log together
///   with the number of retries it cost.
pub struct RetryingClient<C> {
    inner: Arc<C>,
    policy: RetryPolicy,
    metrics: Option<Arc<Metrics>>,
    error_log: Option<Arc<ErrorLog>>,
}

impl<C: ModelClient> RetryingClient<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner: Arc::new(inner),
            policy: RetryPolicy::default(),
            metrics: None,
            error_log: None,
        }
    }

    pub fn from_arc(inner: Arc<C>) -> Self {
        Self {
            inner,
            policy: RetryPolicy::default(),
            metrics: None,
            error_log: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report retry counts to a shared metrics handle.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Record terminal failures, with the observed retry count, to the
    /// structured error log. Attach the log to one layer of a client stack;
    /// this is the layer that knows how many attempts a failure cost.
    pub fn with_error_log(mut self, error_log: Arc<ErrorLog>) -> Self {
        self.error_log = Some(error_log);
        self
    }

    fn note_retry(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_retry();
        }
    }

    fn log_failure(
        &self,
        request: &CompletionRequest,
        response: &str,
        error: &Error,
        attempts: u32,
    ) {
        if let Some(log) = &self.error_log {
            log.record(
                &ErrorRecord::from_error(error, request.kind, &request.prompt, response)
                    .with_attempts(attempts),
            );
        }
    }
}

/// Whether an error is a 429-equivalent signal worth backing off for.
///
/// Providers differ in how they surface throttling; message sniffing covers
/// adapters that only report a generic API error.
fn is_rate_limit(error: &Error) -> bool {
    match error {
        Error::RateLimited(_) => true,
        Error::Api(message) => {
            let lower = message.to_ascii_lowercase();
            lower.contains("429")
                || lower.contains("rate limit")
                || lower.contains("rate_limit")
                || lower.contains("too many requests")
        }
        _ => false,
    }
}

#[async_trait]
impl<C: ModelClient> ModelClient for RetryingClient<C> {
    async fn complete(
        &self,
        cancel: &CancellationToken,
        request: CompletionRequest,
    ) -> Result<CompletionResponse> {
        request.validate()?;

        let mut rate_attempts = 0u32;
        let mut reparsed = false;

        loop {
            let outcome = match timeout(
                self.policy.request_timeout,
                self.inner.complete(cancel, request.clone()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::timeout(self.policy.request_timeout)),
            };

            // Total retries spent so far, for the terminal error record.
            let attempts = rate_attempts + u32::from(reparsed);

            match outcome {
                Ok(response) => {
                    if request.response_format == ResponseFormat::Json
                        && serde_json::from_str::<serde_json::Value>(&response.content).is_err()
                    {
                        if !reparsed {
                            reparsed = true;
                            self.note_retry();
                            tracing::debug!("response content is not JSON, reissuing once");
                            continue;
                        }
                        let error = Error::JsonParse(
                            "content failed strict parsing after one reissue".to_string(),
                        );
                        self.log_failure(&request, &response.content, &error, attempts);
                        return Err(error);
                    }
                    return Ok(response);
                }
                Err(error) if is_rate_limit(&error) && rate_attempts < self.policy.max_retries => {
                    let delay = self.policy.delay_for_attempt(rate_attempts);
                    rate_attempts += 1;
                    self.note_retry();
                    tracing::debug!(
                        attempt = rate_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                    }
                }
                Err(error) => {
                    self.log_failure(&request, "", &error, attempts);
                    return Err(error);
                }
            }
        }
    }
}
