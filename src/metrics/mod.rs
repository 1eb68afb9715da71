//! Thread-safe per-call metrics with latency distribution and cost totals.
//!
//! One accumulator is updated once per model call. Snapshots are immutable
//! deep copies so readers never observe a torn view; the reader-writer lock
//! lets concurrent snapshots share while updates are exclusive.

pub mod cost;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Result};
use crate::prompts::PromptKind;

#[derive(Debug, Default, Clone)]
struct MetricsInner {
    total_requests: u64,
    successes: u64,
    failures: u64,
    retries: u64,
    prompt_tokens: u64,
    completion_tokens: u64,
    total_cost: f64,
    by_model: HashMap<String, u64>,
    by_kind: HashMap<PromptKind, u64>,
    errors: HashMap<ErrorKind, u64>,
    version_mismatches: u64,
    latencies_ms: Vec<u64>,
}

/// Shared metrics accumulator.
#[derive(Debug, Default)]
pub struct Metrics {
    inner: RwLock<MetricsInner>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MetricsInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one successful call.
    pub fn record_success(
        &self,
        model: &str,
        kind: Option<PromptKind>,
        prompt_tokens: u64,
        completion_tokens: u64,
        cost: f64,
        latency: Duration,
    ) {
        let mut inner = self.write();
        inner.total_requests += 1;
        inner.successes += 1;
        inner.prompt_tokens += prompt_tokens;
        inner.completion_tokens += completion_tokens;
        inner.total_cost += cost;
        *inner.by_model.entry(model.to_string()).or_default() += 1;
        if let Some(kind) = kind {
            *inner.by_kind.entry(kind).or_default() += 1;
        }
        inner.latencies_ms.push(latency.as_millis() as u64);
    }

    /// Record one failed call.
    pub fn record_failure(
        &self,
        model: &str,
        kind: Option<PromptKind>,
        error: ErrorKind,
        latency: Duration,
    ) {
        let mut inner = self.write();
        inner.total_requests += 1;
        inner.failures += 1;
        *inner.by_model.entry(model.to_string()).or_default() += 1;
        if let Some(kind) = kind {
            *inner.by_kind.entry(kind).or_default() += 1;
        }
        *inner.errors.entry(error).or_default() += 1;
        inner.latencies_ms.push(latency.as_millis() as u64);
    }

    /// Record one retry (backoff or JSON reissue).
    pub fn record_retry(&self) {
        self.write().retries += 1;
    }

    /// Record a prompt-version mismatch warning.
    pub fn record_version_mismatch(&self) {
        self.write().version_mismatches += 1;
    }

    /// Immutable deep copy of the current state.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        MetricsSnapshot {
            total_requests: inner.total_requests,
            successes: inner.successes,
            failures: inner.failures,
            retries: inner.retries,
            prompt_tokens: inner.prompt_tokens,
            completion_tokens: inner.completion_tokens,
            total_cost: inner.total_cost,
            by_model: inner.by_model,
            by_kind: inner
                .by_kind
                .into_iter()
                .map(|(k, v)| (k.section_tag().to_string(), v))
                .collect(),
            errors: inner.errors,
            version_mismatches: inner.version_mismatches,
            latency: LatencyStats::from_samples(&inner.latencies_ms),
        }
    }

    /// Re-initialise every counter and map.
    pub fn reset(&self) {
        *self.write() = MetricsInner::default();
    }
}

/// Immutable view over the accumulator, serialisable for offline inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub retries: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_cost: f64,
    pub by_model: HashMap<String, u64>,
    pub by_kind: HashMap<String, u64>,
    pub errors: HashMap<ErrorKind, u64>,
    pub version_mismatches: u64,
    pub latency: LatencyStats,
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Latency distribution over the recorded samples, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: u64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub avg_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
}

impl LatencyStats {
    fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        Self {
            count: sorted.len() as u64,
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
            avg_ms: sum as f64 / sorted.len() as f64,
            p50_ms: percentile(&sorted, 50),
            p95_ms: percentile(&sorted, 95),
            p99_ms: percentile(&sorted, 99),
        }
    }
}

/// Select by index `floor(n * p / 100)`, clamped into range.
fn percentile(sorted: &[u64], p: usize) -> u64 {
    let index = (sorted.len() * p / 100).min(sorted.len() - 1);
    sorted[index]
}
