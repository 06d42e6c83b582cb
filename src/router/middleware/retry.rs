// src/router/middleware/retry.rs
// Hand-written exponential backoff — no retry crate appears anywhere in the
// retrieval pack, and the default parameters (5 attempts, 1s initial, 1.5x
// multiplier, 5s cap, 0.5 randomization) are exact enough that a generic
// crate wouldn't buy much over a direct implementation.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::router::RouterConfig;
use crate::error::MemoriaError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub randomization_factor: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts,
            initial_interval: Duration::from_millis(config.retry_initial_interval_ms),
            multiplier: config.retry_multiplier,
            max_interval: Duration::from_millis(config.retry_max_interval_ms),
            randomization_factor: config.retry_randomization_factor,
        }
    }

    fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_interval.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let base = base.min(self.max_interval.as_secs_f64());
        let jitter_span = base * self.randomization_factor;
        let jitter = rand::rng().random_range(-jitter_span..=jitter_span);
        Duration::from_secs_f64((base + jitter).max(0.0))
    }
}

/// Runs `attempt_fn` up to `policy.max_attempts` times, sleeping the
/// exponential backoff interval between failures. A non-retryable error
/// (see [`MemoriaError::is_retryable`]) short-circuits immediately instead
/// of burning the rest of the attempt budget — a bad request or an
/// unauthorized call isn't going to start succeeding if we wait and try
/// again. Returns the last error if every attempt failed.
pub async fn retry_with_backoff<F, Fut>(
    policy: &RetryPolicy,
    mut attempt_fn: F,
) -> Result<(), MemoriaError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), MemoriaError>>,
{
    let mut last_err = None;
    for attempt in 0..policy.max_attempts {
        match attempt_fn().await {
            Ok(()) => return Ok(()),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                let is_last = attempt + 1 == policy.max_attempts;
                if !is_last {
                    tokio::time::sleep(policy.backoff_for_attempt(attempt)).await;
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err.expect("loop runs at least once since max_attempts > 0"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_exhausting_budget() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_interval: Duration::from_millis(1),
            multiplier: 1.5,
            max_interval: Duration::from_millis(5),
            randomization_factor: 0.1,
        };
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff(&policy, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(MemoriaError::transient("not yet"))
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_short_circuits_the_budget() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_interval: Duration::from_millis(1),
            multiplier: 1.5,
            max_interval: Duration::from_millis(5),
            randomization_factor: 0.1,
        };
        let attempts = AtomicU32::new(0);
        let result: Result<(), MemoriaError> = retry_with_backoff(&policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err(MemoriaError::bad_request("malformed envelope")) }
        })
        .await;
        assert!(matches!(result, Err(MemoriaError::BadRequest(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1, "should not retry a bad request");
    }

    #[tokio::test]
    async fn exhausts_budget_and_returns_last_error() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_interval: Duration::from_millis(1),
            multiplier: 1.5,
            max_interval: Duration::from_millis(5),
            randomization_factor: 0.1,
        };
        let attempts = AtomicU32::new(0);
        let result: Result<(), MemoriaError> = retry_with_backoff(&policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err(MemoriaError::transient("always fails")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
