//! Token-bucket rate limiting with a concurrency semaphore.
//!
//! Admission control happens in two stages: a semaphore slot bounds how many
//! calls are in flight, then a bucket token bounds how many calls start per
//! minute. Refill is lazy and coarse: whole elapsed minutes each add
//! `capacity` tokens (clamped at `capacity`), and fractional time carries to
//! the next refill. That keeps the admission bound at `capacity` per minute
//! even under bursts.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

const REFILL_WINDOW: Duration = Duration::from_secs(60);

/// Observable limiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterStatus {
    /// Requests admitted per minute
    pub capacity: u32,
    /// Tokens currently available
    pub available_tokens: u32,
    /// Callers waiting on a bucket token
    pub waiters: u32,
    /// Calls currently holding a concurrency slot
    pub in_flight: usize,
    /// Concurrency cap
    pub max_concurrent: usize,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// In-process token-bucket limiter shared by all workers of a batch.
pub struct RateLimiter {
    capacity: u32,
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    bucket: Mutex<Bucket>,
    waiters: AtomicU32,
}

/// Exclusive ownership of one admission: a concurrency slot plus one
/// consumed bucket token. Dropping the permit releases the slot on every
/// exit path; the token is not returned.
pub struct RatePermit {
    _slot: OwnedSemaphorePermit,
}

/// Drop-safe waiter accounting; the acquire future can be dropped at its
/// sleep point by a caller-side timeout.
struct WaiterGuard<'a>(&'a AtomicU32);

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RateLimiter {
    /// Create a limiter admitting `requests_per_minute` calls per minute
    /// with at most `max_concurrent` calls in flight.
    pub fn new(requests_per_minute: u32, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            capacity: requests_per_minute.max(1),
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            bucket: Mutex::new(Bucket {
                tokens: requests_per_minute.max(1),
                last_refill: Instant::now(),
            }),
            waiters: AtomicU32::new(0),
        }
    }

    /// Add `capacity` tokens per whole elapsed minute, clamped at capacity.
    /// `last_refill` advances only by the consumed whole minutes, so a
    /// partial minute carries over instead of being re-counted.
    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.duration_since(bucket.last_refill);
        let whole_minutes = elapsed.as_secs() / 60;
        if whole_minutes == 0 {
            return;
        }
        let added = u32::try_from(whole_minutes)
            .unwrap_or(u32::MAX)
            .saturating_mul(self.capacity);
        bucket.tokens = bucket.tokens.saturating_add(added).min(self.capacity);
        bucket.last_refill += Duration::from_secs(whole_minutes * 60);
    }

    /// Acquire one admission, waiting first for a concurrency slot and then
    /// for a bucket token. Cancellation at either stage releases whatever
    /// was already held and surfaces [`Error::Cancelled`].
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<RatePermit> {
        let slot = tokio::select! {
            slot = Arc::clone(&self.semaphore).acquire_owned() => {
                slot.map_err(|_| Error::Internal("rate limiter semaphore closed".to_string()))?
            }
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };

        loop {
            let next_refill = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket, Instant::now());
                if bucket.tokens > 0 {
                    bucket.tokens -= 1;
                    None
                } else {
                    Some(bucket.last_refill + REFILL_WINDOW)
                }
            };

            let Some(deadline) = next_refill else {
                return Ok(RatePermit { _slot: slot });
            };

            self.waiters.fetch_add(1, Ordering::SeqCst);
            let _waiting = WaiterGuard(&self.waiters);
            tokio::select! {
                _ = sleep_until(deadline) => {}
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
    }

    /// Acquire with a caller-side deadline; elapsing surfaces as
    /// [`Error::Timeout`].
    pub async fn acquire_timeout(
        &self,
        cancel: &CancellationToken,
        wait: Duration,
    ) -> Result<RatePermit> {
        match tokio::time::timeout(wait, self.acquire(cancel)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(wait)),
        }
    }

    /// Current state, after applying any pending lazy refill.
    pub async fn status(&self) -> RateLimiterStatus {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket, Instant::now());
        RateLimiterStatus {
            capacity: self.capacity,
            available_tokens: bucket.tokens,
            waiters: self.waiters.load(Ordering::SeqCst),
            in_flight: self.max_concurrent - self.semaphore.available_permits(),
            max_concurrent: self.max_concurrent,
        }
    }
}
