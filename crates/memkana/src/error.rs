//! Unified error type for memkana.

use memkana_protocol::ProtocolError;
use memkana_session::SessionError;
use memkana_store::{ConfigError, StoreError};
use memkana_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MemkanaError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (unknown connection, finished game, timer).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A persistence error (connect, write, query, missing player).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The database configuration is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A server setting could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidSetting { key: &'static str, value: String },

    /// A submitted form time is not `MM:SS`.
    #[error("invalid time {0:?}, expected MM:SS")]
    InvalidFormTime(String),
}
