//! Session types: the in-progress game behind one connection.
//!
//! A session is deliberately permissive. A second `start` overwrites
//! the first, pairs are kept even if they arrive before `start`, and an
//! `end` with no usable start still finishes the game. Anything odd is
//! reported back to the caller as a [`DurationAnomaly`] instead of
//! being rejected, so a confused client always gets a terminal answer.

use std::time::Duration;

use memkana_protocol::Pair;

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its game.
///
/// ```text
///   Connected ──(start)──→ Playing ──(end)──→ Finished
///       │                     ↑ │
///       └──────(end)──────────┼─┘
///                        (start, pair)
/// ```
///
/// There is no `Closed` state: a closed connection's session is removed
/// from the registry instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection accepted, no `start` yet.
    Connected,
    /// `start` received; pairs are being matched.
    Playing,
    /// `end` received; the duration has been computed.
    Finished,
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Why a computed duration was clamped to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationAnomaly {
    /// `end` arrived before any `start`.
    MissingStart,
    /// The client's clock says the game ended before it began.
    EndBeforeStart { start: i64, end: i64 },
}

/// The outcome of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Elapsed time between `start` and `end`. Never negative.
    pub duration: Duration,
    /// Set when the timestamps didn't describe a sensible game.
    pub anomaly: Option<DurationAnomaly>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One player's game, scoped to one connection.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    pairs: Vec<Pair>,
    start_timestamp: Option<i64>,
    end_timestamp: Option<i64>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates an empty session in the `Connected` state.
    pub fn new() -> Self {
        Self {
            state: SessionState::Connected,
            pairs: Vec::new(),
            start_timestamp: None,
            end_timestamp: None,
        }
    }

    /// Records the start of the game.
    ///
    /// Returns the previous start timestamp if this call overwrote one.
    ///
    /// # Errors
    /// [`SessionError::AlreadyFinished`] once `end` has been processed.
    pub fn start(&mut self, timestamp: i64) -> Result<Option<i64>, SessionError> {
        self.ensure_open()?;
        let previous = self.start_timestamp.replace(timestamp);
        self.state = SessionState::Playing;
        Ok(previous)
    }

    /// Appends a matched pair in arrival order.
    ///
    /// # Errors
    /// [`SessionError::AlreadyFinished`] once `end` has been processed.
    pub fn record_pair(&mut self, pair: Pair) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.pairs.push(pair);
        Ok(())
    }

    /// Records the end of the game and computes its duration.
    ///
    /// Timestamps are epoch milliseconds. A missing or later start
    /// yields a zero duration plus an anomaly rather than an error.
    ///
    /// # Errors
    /// [`SessionError::AlreadyFinished`] if called twice.
    pub fn finish(&mut self, timestamp: i64) -> Result<Completion, SessionError> {
        self.ensure_open()?;
        self.end_timestamp = Some(timestamp);
        self.state = SessionState::Finished;

        let completion = match self.start_timestamp {
            None => Completion {
                duration: Duration::ZERO,
                anomaly: Some(DurationAnomaly::MissingStart),
            },
            Some(start) if timestamp < start => Completion {
                duration: Duration::ZERO,
                anomaly: Some(DurationAnomaly::EndBeforeStart {
                    start,
                    end: timestamp,
                }),
            },
            Some(start) => Completion {
                duration: Duration::from_millis(timestamp.abs_diff(start)),
                anomaly: None,
            },
        };
        Ok(completion)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn start_timestamp(&self) -> Option<i64> {
        self.start_timestamp
    }

    pub fn end_timestamp(&self) -> Option<i64> {
        self.end_timestamp
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Finished {
            return Err(SessionError::AlreadyFinished);
        }
        Ok(())
    }
}
