//! Model client contract, resilience decorators, and batch execution.
//!
//! The layering mirrors how calls flow at runtime: a [`ModelClient`] makes
//! one completion; [`RetryingClient`] adds backoff, JSON enforcement, and a
//! deadline; [`ThrottledClient`] adds token-bucket admission; and
//! [`BatchExecutor`] fans a request vector across a bounded worker pool
//! while preserving order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rag_llm_core::llm::{
//!     BatchExecutor, BatchRequest, ClientConfig, CompletionRequest,
//!     HttpModelClient, RateLimiter, RetryingClient, ThrottledClient,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! let client = HttpModelClient::new(ClientConfig::new(api_key))?;
//! let limiter = Arc::new(RateLimiter::new(600, 10));
//! let client = RetryingClient::new(ThrottledClient::new(client, limiter));
//!
//! let executor = BatchExecutor::new(client).with_max_concurrency(10);
//! let results = executor.process(&CancellationToken::new(), requests).await;
//! ```

mod batch;
mod client;
mod limiter;
mod progress;
mod retry;
mod throttle;
mod types;

pub use batch::{
    batch_stats, BatchExecutor, BatchStats, Progress, DEFAULT_MAX_CONCURRENCY,
};
pub use client::{ClientConfig, HttpModelClient, ModelClient};
pub use limiter::{RateLimiter, RateLimiterStatus, RatePermit};
pub use progress::{ProgressBar, ProgressLogger};
pub use retry::{RetryPolicy, RetryingClient};
pub use throttle::ThrottledClient;
pub use types::{
    BatchRequest, BatchResult, CompletionRequest, CompletionResponse, ResponseFormat,
};
