//! Error types for rag-llm-core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using rag-llm-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while orchestrating model calls.
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream model API error
    #[error("model API error: {0}")]
    Api(String),

    /// Provider signalled a rate limit (429-equivalent)
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// Timeout during operation
    #[error("operation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Response content failed strict JSON parsing
    #[error("response is not valid JSON: {0}")]
    JsonParse(String),

    /// Operation was cancelled via its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// Request rejected before dispatch
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Prompt kind not present in the registry
    #[error("unknown prompt kind: {0}")]
    UnknownPromptKind(String),

    /// Parsed response violated a domain constraint
    #[error("response failed validation: {0}")]
    Validation(String),

    /// Daily cost ceiling reached
    #[error("daily cost ceiling exceeded: spent ${spent:.4} of ${ceiling:.4}")]
    CostCeiling { spent: f64, ceiling: f64 },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a timeout error from an elapsed duration.
    pub fn timeout(elapsed: std::time::Duration) -> Self {
        Self::Timeout {
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// Create an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Classify this error into the closed set recorded in logs and metrics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::JsonParse(_) => ErrorKind::JsonParseFailed,
            Self::RateLimited(_) => ErrorKind::RateLimitExceeded,
            Self::Timeout { .. } => ErrorKind::Timeout,
            _ => ErrorKind::Unknown,
        }
    }
}

/// Closed classification of failing calls, as recorded in the error log
/// and the metrics error breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    JsonParseFailed,
    RateLimitExceeded,
    Timeout,
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JsonParseFailed => write!(f, "json_parse_failed"),
            Self::RateLimitExceeded => write!(f, "rate_limit_exceeded"),
            Self::Timeout => write!(f, "timeout"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            Error::JsonParse("bad".into()).kind(),
            ErrorKind::JsonParseFailed
        );
        assert_eq!(
            Error::RateLimited("429".into()).kind(),
            ErrorKind::RateLimitExceeded
        );
        assert_eq!(
            Error::Timeout { elapsed_ms: 60_000 }.kind(),
            ErrorKind::Timeout
        );
        assert_eq!(Error::Api("boom".into()).kind(), ErrorKind::Unknown);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::JsonParseFailed).unwrap();
        assert_eq!(json, "\"json_parse_failed\"");
        let back: ErrorKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorKind::JsonParseFailed);
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::timeout(std::time::Duration::from_secs(60));
        assert_eq!(err.to_string(), "operation timed out after 60000ms");
    }
}
