//! Store call timeouts and retry policy.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^(attempt-1)
    #[default]
    Exponential,
}

/// Retry policy for transient store failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first call (0 = no retries)
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
    /// Jitter factor (0.0-1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_millis(50), Duration::from_secs(2))
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
            jitter: 0.0,
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
            jitter: 0.1,
        }
    }

    /// Delay before retry number `attempt` (1-indexed).
    ///
    /// The jitter is a pure function of `(attempt, seed)`: callers retrying
    /// different orders pass different seeds and spread out, while the same
    /// seed always yields the same schedule.
    pub fn delay_for_attempt(&self, attempt: u32, seed: u64) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        let delay_ms = match self.strategy {
            BackoffStrategy::Fixed => base_ms,
            BackoffStrategy::Exponential => {
                let exp = 2_f64.powi((attempt - 1).min(30) as i32);
                (base_ms * exp).min(max_ms)
            }
        };

        let jitter_range = delay_ms * self.jitter;
        let jitter = if jitter_range > 0.0 {
            let unit = (mix(seed ^ u64::from(attempt)) % 10_000) as f64 / 10_000.0;
            jitter_range * (unit - 0.5) * 2.0
        } else {
            0.0
        };

        Duration::from_millis((delay_ms + jitter).max(0.0) as u64)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// splitmix64 finalizer.
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Wraps every store call in a timeout and retries transient failures.
#[derive(Debug, Clone)]
pub struct StoreGuard {
    timeout: Duration,
    retry: RetryPolicy,
    calls: Arc<AtomicU64>,
}

impl StoreGuard {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            timeout,
            retry,
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run an idempotent `call`, mapping a timeout to `Unavailable` and
    /// retrying only `Unavailable` with backoff.
    ///
    /// Not for conditional writes: a write whose ack was lost may have
    /// committed, and blindly repeating it turns success into a conflict.
    /// Use [`StoreGuard::call_once`] and [`StoreGuard::backoff`] for those.
    pub async fn call<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let seed = self.calls.fetch_add(1, Ordering::Relaxed);
        let mut retries = 0;
        loop {
            match self.call_once(operation, call()).await {
                Err(err) if err.is_retryable() => match self.backoff(retries + 1, seed) {
                    Some(delay) => {
                        retries += 1;
                        tracing::warn!(
                            operation,
                            attempt = retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "store call failed; retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(operation, attempts = retries + 1, error = %err, "store call failed");
                        return Err(err);
                    }
                },
                other => return other,
            }
        }
    }

    /// Run `fut` once under the store timeout.
    pub async fn call_once<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "{operation} timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Delay before retry number `attempt` (1-indexed), or `None` once the
    /// policy is exhausted.
    pub fn backoff(&self, attempt: u32, seed: u64) -> Option<Duration> {
        self.retry
            .should_retry(attempt.saturating_sub(1))
            .then(|| self.retry.delay_for_attempt(attempt, seed))
    }
}
