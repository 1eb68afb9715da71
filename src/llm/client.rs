//! Model client contract and the bundled HTTP adapter.
//!
//! The core depends on a single abstract operation: submit one completion
//! request, get back one classified response. Retry, rate limiting, and
//! batching are added by the decorators in this module's siblings.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

use super::types::{CompletionRequest, CompletionResponse, ResponseFormat};

/// Uniform contract over one model call.
///
/// Implementations must be safe for concurrent use. The contract promises no
/// retries, no rate limiting, and no determinism; decorators layer those on.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Complete a prompt, or fail with a classified error.
    ///
    /// Implementations observe `cancel` at their suspension points and
    /// surface [`Error::Cancelled`] when it fires mid-call.
    async fn complete(
        &self,
        cancel: &CancellationToken,
        request: CompletionRequest,
    ) -> Result<CompletionResponse>;
}

#[async_trait]
impl<C: ModelClient + ?Sized> ModelClient for std::sync::Arc<C> {
    async fn complete(
        &self,
        cancel: &CancellationToken,
        request: CompletionRequest,
    ) -> Result<CompletionResponse> {
        (**self).complete(cancel, request).await
    }
}

/// Configuration for HTTP model clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key
    pub api_key: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Default model
    pub default_model: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            default_model: None,
            timeout_secs: 120,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Adapter for OpenAI-compatible chat-completion endpoints.
///
/// Any upstream that speaks this wire shape (OpenAI, many local servers) can
/// serve the contract; other providers are adapted externally.
pub struct HttpModelClient {
    config: ClientConfig,
    http: Client,
}

impl HttpModelClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";
    const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, http })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ApiResponseFormat>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ApiResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pull the "version" field out of a JSON response payload.
///
/// Prompt templates instruct the model to echo its prompt version; a payload
/// without one yields an empty version, which the registry treats as a
/// mismatch warning downstream.
fn extract_prompt_version(content: &str) -> String {
    serde_json::from_str::<serde_json::Value>(content)
        .ok()
        .and_then(|v| v.get("version").and_then(|v| v.as_str()).map(String::from))
        .unwrap_or_default()
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(
        &self,
        cancel: &CancellationToken,
        request: CompletionRequest,
    ) -> Result<CompletionResponse> {
        request.validate()?;

        let model = request
            .model
            .clone()
            .or_else(|| self.config.default_model.clone())
            .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string());

        let response_format = match request.response_format {
            ResponseFormat::Json => Some(ApiResponseFormat {
                format_type: "json_object",
            }),
            ResponseFormat::Text => None,
        };

        let api_request = ApiRequest {
            model: model.clone(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format,
        };

        let url = format!("{}/v1/chat/completions", self.base_url());
        let send = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&api_request)
            .send();

        let response = tokio::select! {
            response = send => response.map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(Duration::from_secs(self.config.timeout_secs))
                } else {
                    Error::Api(format!("HTTP request failed: {e}"))
                }
            })?,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };

        let status = response.status();
        let body = tokio::select! {
            body = response.text() => {
                body.map_err(|e| Error::Api(format!("failed to read response: {e}")))?
            }
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited(format!("HTTP 429: {body}")));
        }
        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                return Err(Error::Api(format!(
                    "API error ({status}): {}",
                    error.error.message
                )));
            }
            return Err(Error::Api(format!("API error ({status}): {body}")));
        }

        let api_response: ApiResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Api(format!("failed to parse response envelope: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Api("no choices in response".to_string()))?;

        let prompt_version = match request.response_format {
            ResponseFormat::Json => extract_prompt_version(&choice.message.content),
            ResponseFormat::Text => String::new(),
        };

        Ok(CompletionResponse {
            content: choice.message.content,
            tokens_used: api_response.usage.total_tokens,
            prompt_version,
            model: api_response.model,
        })
    }
}
