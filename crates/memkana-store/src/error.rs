//! Error types for the persistence layer.

use memkana_protocol::PlayerName;

/// A required connection parameter is missing or unusable.
///
/// Raised before any connection attempt, so it is never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing {0} env var")]
    Missing(&'static str),

    /// The port is not a valid `u16`.
    #[error("invalid POSTGRES_PORT: {0:?}")]
    InvalidPort(String),
}

/// Errors that can occur talking to the scoreboard store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Every connection attempt failed.
    #[error("connection to postgres timed out after {attempts} attempts")]
    ConnectionTimeout { attempts: u32 },

    /// A single connection attempt failed. Only seen inside the retry
    /// loop; callers of `connect` get `ConnectionTimeout` instead.
    #[error("failed to connect to postgres: {0}")]
    Connect(#[source] tokio_postgres::Error),

    /// Writing a result row failed.
    #[error("failed to record result: {0}")]
    Write(#[source] tokio_postgres::Error),

    /// Reading the scoreboard failed.
    #[error("scoreboard query failed: {0}")]
    Query(#[source] tokio_postgres::Error),

    /// The player has no recorded result.
    #[error("no result recorded for player {0}")]
    NotFound(PlayerName),

    /// The store is not accepting requests.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
