//! Bounded retry with exponential backoff.
//!
//! In a `docker compose up` the game server routinely starts before the
//! database accepts connections. Startup therefore retries a few times,
//! doubling the wait after each failure, and then gives up with a typed
//! error so the process exits instead of serving traffic it can't record.
//!
//! [`retry_with_backoff`] knows nothing about Postgres; any fallible
//! async operation can be retried with it.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::StoreError;

/// How many times to try, and how long to wait after the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts.
    pub retries: u32,
    /// Wait after the first failure; doubled after every further one.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            base_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Total deliberate delay if every attempt fails:
    /// `base * (2^retries - 1)`.
    pub fn total_backoff(&self) -> Duration {
        (0..self.retries)
            .map(|n| self.base_backoff.saturating_mul(1u32 << n.min(31)))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Runs `op` until it succeeds or `policy.retries` attempts have failed.
///
/// `op` receives the 1-based attempt number. After each failure the loop
/// sleeps for the current backoff and then doubles it, so three attempts
/// with a 1 ms base sleep 1 + 2 + 4 = 7 ms in total.
///
/// # Errors
/// [`StoreError::ConnectionTimeout`] once every attempt has failed.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut delay = policy.base_backoff;

    for attempt in 1..=policy.retries {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::info!(
                    attempt,
                    retries = policy.retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }
    }

    Err(StoreError::ConnectionTimeout {
        attempts: policy.retries,
    })
}
