//! Batched completion execution with bounded parallelism.
//!
//! The executor owns a worker pool drawn from a counted semaphore, runs each
//! request on its own task, and returns a result vector aligned index-for-
//! index with the input. One item failing never aborts the batch.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::error_log::{ErrorLog, ErrorRecord};

use super::client::ModelClient;
use super::types::{BatchRequest, BatchResult};

/// Default maximum parallel requests.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Immutable progress snapshot handed to the callback after every item.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    /// Total items in the batch
    pub total: usize,
    /// Items finished, success or failure
    pub completed: usize,
    /// Items finished with an error
    pub failed: usize,
    /// Wall-clock time since the batch started
    pub elapsed: Duration,
    /// Estimated time remaining, `(elapsed / completed) * (total - completed)`
    pub eta: Duration,
}

impl Progress {
    /// Fraction of successful completions among finished items.
    pub fn success_rate(&self) -> f64 {
        if self.completed == 0 {
            return 1.0;
        }
        (self.completed - self.failed) as f64 / self.completed as f64
    }
}

type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

#[derive(Debug, Default)]
struct Counters {
    completed: usize,
    failed: usize,
}

/// Executor for batched completion requests.
pub struct BatchExecutor<C> {
    client: Arc<C>,
    max_concurrency: usize,
    progress: Option<ProgressCallback>,
    error_log: Option<Arc<ErrorLog>>,
}

impl<C: ModelClient + 'static> BatchExecutor<C> {
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            progress: None,
            error_log: None,
        }
    }

    pub fn from_arc(client: Arc<C>) -> Self {
        Self {
            client,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            progress: None,
            error_log: None,
        }
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Invoke `callback` with a progress snapshot after every completion.
    pub fn with_progress(mut self, callback: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Record every failing item to the structured error log.
    pub fn with_error_log(mut self, error_log: Arc<ErrorLog>) -> Self {
        self.error_log = Some(error_log);
        self
    }

    /// Execute the batch and return results in input order.
    ///
    /// Returns only after every worker has completed or recorded a
    /// cancellation failure. `results[i].id == requests[i].id` for all `i`;
    /// an empty input returns an empty vector immediately.
    pub async fn process(
        &self,
        cancel: &CancellationToken,
        requests: Vec<BatchRequest>,
    ) -> Vec<BatchResult> {
        let total = requests.len();
        if total == 0 {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let counters = Arc::new(Mutex::new(Counters::default()));
        let started = Instant::now();
        let ids: Vec<String> = requests.iter().map(|r| r.id.clone()).collect();

        let mut handles = Vec::with_capacity(total);
        for request in requests {
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let counters = Arc::clone(&counters);
            let progress = self.progress.clone();
            let error_log = self.error_log.clone();

            handles.push(tokio::spawn(async move {
                let permit = tokio::select! {
                    permit = semaphore.acquire_owned() => {
                        permit.expect("batch semaphore closed unexpectedly")
                    }
                    _ = cancel.cancelled() => {
                        let result =
                            BatchResult::failure(request.id, &Error::Cancelled, Duration::ZERO);
                        record_item(&counters, &progress, total, started, false);
                        return result;
                    }
                };

                let call_started = Instant::now();
                let outcome = client.complete(&cancel, request.request.clone()).await;
                let duration = call_started.elapsed();
                drop(permit);

                let result = match outcome {
                    Ok(response) => BatchResult::success(request.id, response, duration),
                    Err(error) => {
                        if let Some(log) = &error_log {
                            log.record(&ErrorRecord::from_error(
                                &error,
                                request.request.kind,
                                &request.request.prompt,
                                "",
                            ));
                        }
                        BatchResult::failure(request.id, &error, duration)
                    }
                };
                record_item(&counters, &progress, total, started, result.is_success());
                result
            }));
        }

        let mut results = Vec::with_capacity(total);
        for (index, outcome) in join_all(handles).await.into_iter().enumerate() {
            match outcome {
                Ok(result) => results.push(result),
                Err(join_error) => {
                    // A panicked worker still yields a failure at its index.
                    tracing::warn!(index, %join_error, "batch worker panicked");
                    record_item(&counters, &self.progress, total, started, false);
                    results.push(BatchResult::failure(
                        ids[index].clone(),
                        &Error::Internal(format!("worker panicked: {join_error}")),
                        Duration::ZERO,
                    ));
                }
            }
        }
        results
    }
}

/// Bump the shared counters and fire the callback while holding the lock, so
/// every observer sees a consistent `(completed, failed, total)` triple. A
/// poisoned lock (a panicking callback) is recovered so the batch finishes.
fn record_item(
    counters: &Mutex<Counters>,
    progress: &Option<ProgressCallback>,
    total: usize,
    started: Instant,
    success: bool,
) {
    let mut counters = counters
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    counters.completed += 1;
    if !success {
        counters.failed += 1;
    }

    if let Some(callback) = progress {
        let elapsed = started.elapsed();
        let remaining = total - counters.completed;
        let eta = if counters.completed > 0 {
            elapsed.mul_f64(remaining as f64 / counters.completed as f64)
        } else {
            Duration::ZERO
        };
        callback(&Progress {
            total,
            completed: counters.completed,
            failed: counters.failed,
            elapsed,
            eta,
        });
    }
}

/// Aggregates over a finished batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Sum of successful call durations
    pub total_duration: Duration,
    /// Average successful call duration
    pub avg_duration: Duration,
    /// Shortest successful call
    pub min_duration: Duration,
    /// Longest successful call
    pub max_duration: Duration,
    /// Identifiers of every failing item, in result order
    pub failed_ids: Vec<String>,
}

/// Pure aggregation over a result vector.
pub fn batch_stats(results: &[BatchResult]) -> BatchStats {
    let mut stats = BatchStats {
        total: results.len(),
        succeeded: 0,
        failed: 0,
        total_duration: Duration::ZERO,
        avg_duration: Duration::ZERO,
        min_duration: Duration::MAX,
        max_duration: Duration::ZERO,
        failed_ids: Vec::new(),
    };

    for result in results {
        if result.is_success() {
            stats.succeeded += 1;
            stats.total_duration += result.duration;
            stats.min_duration = stats.min_duration.min(result.duration);
            stats.max_duration = stats.max_duration.max(result.duration);
        } else {
            stats.failed += 1;
            stats.failed_ids.push(result.id.clone());
        }
    }

    if stats.succeeded > 0 {
        stats.avg_duration = stats.total_duration / stats.succeeded as u32;
    } else {
        stats.min_duration = Duration::ZERO;
    }
    stats
}
