//! Bounded retry for optimistic-concurrency conflicts
//!
//! Every compare-and-swap loop in the engine goes through `retry_on_conflict`.
//! Only `VersionConflict` is retried; everything else is returned at once.
//! After `max_attempts` conflicting attempts the caller gets `StaleVersion`.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{EngineError, EngineResult};

/// Configuration for retry behavior on version conflicts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 16,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff with up to 50% jitter, capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX));
        let capped = exp.min(self.max_delay);
        let jitter_ceiling = capped.as_micros() as u64 / 2;
        let jitter = if jitter_ceiling > 0 {
            rand::thread_rng().gen_range(0..=jitter_ceiling)
        } else {
            0
        };
        capped + Duration::from_micros(jitter)
    }
}

/// Run `op` until it stops reporting version conflicts or the budget runs out
pub async fn retry_on_conflict<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Err(err) if err.is_conflict() => {
                if attempt >= policy.max_attempts {
                    tracing::warn!(operation, attempts = attempt, "retry budget exhausted");
                    return Err(EngineError::StaleVersion {
                        operation,
                        attempts: attempt,
                    });
                }
                let delay = policy.delay_for(attempt);
                tracing::debug!(operation, attempt, ?delay, error = %err, "conflict, backing off");
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}
