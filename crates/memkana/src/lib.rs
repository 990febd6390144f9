//! # memkana
//!
//! Game-session tracker for the memkana kana memory game.
//!
//! Each browser opens a WebSocket for the length of one game and reports
//! `start`, every matched `pair`, and `end`. The server keeps the game in
//! a per-connection session, computes its duration when it ends, records
//! it under a fresh guest name and redirects the browser to the
//! scoreboard.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memkana::prelude::*;
//!
//! # async fn example() -> Result<(), MemkanaError> {
//! let config = ServerConfig::from_env()?;
//! let store = PgStore::connect(&StoreConfig::from_env()?, config.retry).await?;
//! store.ensure_schema().await?;
//!
//! let server = MemkanaServerBuilder::new().config(&config).build(store).await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
pub mod scoreboard;
mod server;

pub use config::{DEFAULT_BIND, ServerConfig};
pub use error::MemkanaError;
pub use server::{DEFAULT_HANDSHAKE_TIMEOUT, MemkanaServer, MemkanaServerBuilder};

/// Re-exports everything needed to run a server or query the scoreboard.
pub mod prelude {
    pub use crate::scoreboard::{
        ScoreboardRow, ScoreboardView, format_time, load_scoreboard,
        parse_form_time, scoreboard_redirect, submit_form_time,
    };
    pub use crate::{MemkanaError, MemkanaServer, MemkanaServerBuilder, ServerConfig};

    pub use memkana_protocol::{
        ClientMessage, Codec, Envelope, JsonCodec, Pair, PlayerName,
        ServerMessage, Timestamp,
    };
    pub use memkana_session::{SessionRegistry, SessionState, TimerBook};
    pub use memkana_store::{
        MemoryStore, PgStore, PlayerRank, PlayerTime, RetryPolicy, ScoreStore,
        StoreConfig, StoreError,
    };
}
