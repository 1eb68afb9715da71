//! Request, response, and batch item shapes for the model client contract.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::prompts::PromptKind;

/// Expected shape of the model's response content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    Json,
}

/// A single completion request. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Prompt text sent to the model
    pub prompt: String,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f64,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Expected response format
    pub response_format: ResponseFormat,
    /// Model override (provider default when unset)
    pub model: Option<String>,
    /// Prompt kind, carried for observability only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PromptKind>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.0,
            max_tokens: 1024,
            response_format: ResponseFormat::Text,
            model: None,
            kind: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_kind(mut self, kind: PromptKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Reject requests that can never be served.
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(Error::invalid_request("max_tokens must be greater than 0"));
        }
        if self.prompt.is_empty() {
            return Err(Error::invalid_request("prompt must not be empty"));
        }
        Ok(())
    }
}

/// A single completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated content
    pub content: String,
    /// Tokens consumed by the call
    pub tokens_used: u32,
    /// "major.minor" version stamped into the response payload
    pub prompt_version: String,
    /// Model that actually served the request
    pub model: String,
}

/// One entry of a batch: a caller-supplied correlation id plus a request.
///
/// The executor never interprets the id; it only carries it through to the
/// result at the same index.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub id: String,
    pub request: CompletionRequest,
}

impl BatchRequest {
    pub fn new(id: impl Into<String>, request: CompletionRequest) -> Self {
        Self {
            id: id.into(),
            request,
        }
    }
}

/// Outcome of one batch entry, aligned with its request index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// Caller-supplied identifier, copied from the request
    pub id: String,
    /// Response, present on success
    pub response: Option<CompletionResponse>,
    /// Error classification, present on failure
    pub error: Option<ErrorKind>,
    /// Human-readable error message, present on failure
    pub error_message: Option<String>,
    /// Observed wall-clock duration of the call
    pub duration: Duration,
}

impl BatchResult {
    /// Create a successful result.
    pub fn success(id: impl Into<String>, response: CompletionResponse, duration: Duration) -> Self {
        Self {
            id: id.into(),
            response: Some(response),
            error: None,
            error_message: None,
            duration,
        }
    }

    /// Create a failed result from an error.
    pub fn failure(id: impl Into<String>, error: &Error, duration: Duration) -> Self {
        Self {
            id: id.into(),
            response: None,
            error: Some(error.kind()),
            error_message: Some(error.to_string()),
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
