//! Error types for the session layer.

use memkana_transport::ConnectionId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session is registered for the connection.
    ///
    /// A message raced the connection's teardown. The engine drops such
    /// messages without replying.
    #[error("session not found for {0}")]
    NotFound(ConnectionId),

    /// The game already ended; the session takes no further events.
    #[error("session already finished")]
    AlreadyFinished,

    /// No running timer has this id. It was never started, or it was
    /// already stopped.
    #[error("timer not found: {0}")]
    TimerNotFound(String),
}
