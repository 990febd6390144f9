//! Transport abstraction layer for memkana.
//!
//! Provides the [`Transport`], [`Handshake`] and [`Connection`] traits that
//! abstract over the duplex channel each player's browser opens to the
//! game server. Accepting a socket and upgrading it are separate steps, so
//! a slow upgrade can run off the accept loop.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one player's socket for as long as the process runs.
///
/// The session registry keys in-progress games by this id. Ids come
/// from a process-wide counter and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw id. Tests use this to address registry entries
    /// directly; transports call [`ConnectionId::next`].
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a fresh id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Listens for players opening a game page.
///
/// `accept` only takes the raw connection off the listener. The upgrade
/// runs separately through [`Handshake::upgrade`], so a slow peer never
/// holds up the accept loop.
pub trait Transport: Send + Sync + 'static {
    type Pending: Handshake<Connection = Self::Connection, Error = Self::Error>;
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;
}

/// An accepted connection that hasn't completed its upgrade yet.
pub trait Handshake: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Completes the upgrade, giving up after `timeout`.
    async fn upgrade(self, timeout: Duration) -> Result<Self::Connection, Self::Error>;

    fn peer_addr(&self) -> SocketAddr;
}

/// One player's duplex channel for the length of a game.
///
/// Outbound messages are always text; inbound frames are handed up as
/// raw bytes whether the browser sent text or binary.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends a text frame.
    async fn send(&self, text: &str) -> Result<(), Self::Error>;

    /// Waits for the next data frame, skipping control frames.
    ///
    /// Returns `Ok(None)` when the peer closed normally or navigated
    /// away.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts the closing handshake.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    /// The remote address, if the transport knows it.
    fn peer_addr(&self) -> Option<SocketAddr>;
}
