//! Server-side stopwatches.
//!
//! The game page can time a run on the server instead of trusting its
//! own clock: it starts a timer when the board is shown, keeps the
//! returned id, and stops the timer when the last pair is matched. The
//! elapsed time then feeds the form submission path.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::SessionError;
use crate::identity::random_id;

/// Length of a generated timer id.
pub const TIMER_ID_LEN: usize = 16;

/// Timers older than this are forgotten. No game takes an hour.
pub const DEFAULT_MAX_TIMER_AGE: Duration = Duration::from_secs(60 * 60);

/// Returned by [`TimerBook::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerStart {
    /// Opaque id the client must present to stop the timer.
    pub timer_id: String,
    /// Wall-clock start in epoch milliseconds, so the client can
    /// estimate its latency to the server.
    pub started_at_ms: i64,
}

/// All running timers.
///
/// A client that starts a timer and never stops it would otherwise leak
/// the entry, so timers past `max_age` are swept on every `start` and
/// refused by `stop`.
#[derive(Debug)]
pub struct TimerBook {
    timers: Mutex<HashMap<String, Instant>>,
    max_age: Duration,
}

impl Default for TimerBook {
    fn default() -> Self {
        Self::with_max_age(DEFAULT_MAX_TIMER_AGE)
    }
}

impl TimerBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_age(max_age: Duration) -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            max_age,
        }
    }

    /// Starts a new timer, first dropping any that have expired.
    pub async fn start(&self) -> TimerStart {
        let timer_id = random_id(TIMER_ID_LEN);
        {
            let mut timers = self.timers.lock().await;
            let before = timers.len();
            timers.retain(|_, started| started.elapsed() <= self.max_age);
            let expired = before - timers.len();
            if expired > 0 {
                tracing::debug!(expired, "expired timers evicted");
            }
            timers.insert(timer_id.clone(), Instant::now());
        }

        let started_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or_default();

        tracing::debug!(%timer_id, "timer started");
        TimerStart {
            timer_id,
            started_at_ms,
        }
    }

    /// Stops a timer and returns the time since it was started.
    ///
    /// A timer can be stopped once.
    ///
    /// # Errors
    /// [`SessionError::TimerNotFound`] for an unknown, already-stopped or
    /// expired id.
    pub async fn stop(&self, timer_id: &str) -> Result<Duration, SessionError> {
        let started = self
            .timers
            .lock()
            .await
            .remove(timer_id)
            .ok_or_else(|| SessionError::TimerNotFound(timer_id.to_owned()))?;
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        if elapsed > self.max_age {
            tracing::debug!(%timer_id, elapsed_ms, "expired timer stopped");
            return Err(SessionError::TimerNotFound(timer_id.to_owned()));
        }
        tracing::debug!(%timer_id, elapsed_ms, "timer stopped");
        Ok(elapsed)
    }

    /// Returns the number of running timers.
    pub async fn len(&self) -> usize {
        self.timers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.timers.lock().await.is_empty()
    }
}
