//! # rag-llm-core
//!
//! The LLM orchestration core of a RAG ingestion pipeline. It drives many
//! thousands of model calls to produce file summaries, chunk summaries, and
//! domain classifications, sustaining throughput without exceeding provider
//! rate limits and surviving partial failure.
//!
//! ## Core Components
//!
//! - **llm**: model client contract, retry/throttle decorators, the batch
//!   executor, and progress reporting
//! - **prompts**: versioned prompt templates with typed, validated responses
//! - **metrics**: per-call counters, latency distribution, and cost limits
//! - **error_log**: append-only JSONL record of failing calls
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rag_llm_core::{
//!     BatchExecutor, BatchRequest, ErrorLog, FileSummaryGenerator,
//!     FileSummaryRequest, PromptRegistry, RateLimiter, RetryingClient,
//!     ThrottledClient,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! let registry = Arc::new(PromptRegistry::with_defaults());
//! let error_log = Arc::new(ErrorLog::new("logs/"));
//! let generator = FileSummaryGenerator::new(registry, Arc::clone(&error_log));
//!
//! let requests: Vec<BatchRequest> = files
//!     .iter()
//!     .map(|f| {
//!         let request = generator.build_request(&FileSummaryRequest {
//!             path: f.path.clone(),
//!             language: f.language.clone(),
//!             content: f.content.clone(),
//!         })?;
//!         Ok(BatchRequest::new(f.path.clone(), request))
//!     })
//!     .collect::<rag_llm_core::Result<_>>()?;
//!
//! let limiter = Arc::new(RateLimiter::new(600, 10));
//! let client = RetryingClient::new(ThrottledClient::new(model_client, limiter))
//!     .with_error_log(error_log);
//! let executor = BatchExecutor::new(client);
//! let results = executor.process(&CancellationToken::new(), requests).await;
//! ```

pub mod error;
pub mod error_log;
pub mod llm;
pub mod metrics;
pub mod prompts;
pub mod tokens;

// Re-exports for convenience
pub use error::{Error, ErrorKind, Result};
pub use error_log::{ErrorLog, ErrorRecord};
pub use llm::{
    batch_stats, BatchExecutor, BatchRequest, BatchResult, BatchStats, ClientConfig,
    CompletionRequest, CompletionResponse, HttpModelClient, ModelClient, Progress, ProgressBar,
    ProgressLogger, RateLimiter, RateLimiterStatus, RatePermit, ResponseFormat, RetryPolicy,
    RetryingClient, ThrottledClient, DEFAULT_MAX_CONCURRENCY,
};
pub use metrics::cost::{CostLimits, CostManager, ModelPricing, PricingConfig};
pub use metrics::{LatencyStats, Metrics, MetricsSnapshot};
pub use prompts::{
    parse_error_envelope, ChunkSummary, ChunkSummaryGenerator, ChunkSummaryRequest, Domain,
    DomainClassification, DomainClassificationRequest, DomainClassifier, FileSummary,
    FileSummaryGenerator, FileSummaryRequest, PromptKind, PromptRegistry,
};
pub use tokens::count_tokens;
