//! Wire protocol for memkana.
//!
//! This crate defines the messages a game page and the server exchange
//! over the WebSocket:
//!
//! - **Types** ([`Envelope`], [`ClientMessage`], [`ServerMessage`],
//!   [`Pair`], [`Timestamp`], [`PlayerName`]).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]).
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope → ClientMessage) → Session
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientMessage, Envelope, Pair, PlayerName, ServerMessage, Timestamp,
};
