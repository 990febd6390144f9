//! `MemkanaServer` builder and server loop.
//!
//! This is the entry point for running the game server. It ties
//! together all the layers: transport → protocol → session → store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use memkana_protocol::{Codec, JsonCodec};
use memkana_session::SessionRegistry;
use memkana_store::ScoreStore;
use memkana_transport::{Handshake, PendingWebSocket, Transport, WebSocketTransport};

use crate::MemkanaError;
use crate::config::{DEFAULT_BIND, ServerConfig};
use crate::handler::handle_connection;

/// How long a freshly accepted socket gets to finish the WebSocket upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a failed accept, e.g. when the process is out of file
/// descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry has its own `Arc` so the server can hand it out for
/// inspection.
pub(crate) struct ServerState<S: ScoreStore, C: Codec> {
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) store: S,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Option<Duration>,
}

/// Builder for configuring and starting a memkana server.
///
/// # Example
///
/// ```rust,no_run
/// use memkana::prelude::*;
///
/// # async fn example() -> Result<(), MemkanaError> {
/// let server = MemkanaServerBuilder::new()
///     .bind("0.0.0.0:1234")
///     .build(MemoryStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct MemkanaServerBuilder {
    bind_addr: String,
    idle_timeout: Option<Duration>,
    handshake_timeout: Duration,
}

impl MemkanaServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            idle_timeout: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Takes bind address and idle timeout from a loaded config.
    pub fn config(self, config: &ServerConfig) -> Self {
        self.bind(&config.bind).idle_timeout(config.idle_timeout)
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Closes sessions that receive nothing for `timeout`. `None`
    /// disables the check.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Drops sockets that have not completed the WebSocket upgrade
    /// within `timeout`.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listener and returns a server that records finished
    /// games in `store`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<S: ScoreStore>(
        self,
        store: S,
    ) -> Result<MemkanaServer<S, JsonCodec>, MemkanaError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Arc::new(SessionRegistry::new()),
            store,
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
        });

        Ok(MemkanaServer {
            transport,
            state,
            handshake_timeout: self.handshake_timeout,
        })
    }
}

impl Default for MemkanaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound memkana game server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct MemkanaServer<S: ScoreStore, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, C>>,
    handshake_timeout: Duration,
}

impl<S, C> MemkanaServer<S, C>
where
    S: ScoreStore,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry of in-progress sessions.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.state.registry)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming sockets and spawns a task for each that performs
    /// the upgrade and then runs the handler, so a slow client never
    /// holds up the loop. A failing connection never stops the loop.
    /// Runs until the future is dropped.
    pub async fn run(mut self) -> Result<(), MemkanaError> {
        tracing::info!(addr = ?self.local_addr().ok(), "memkana server running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    let timeout = self.handshake_timeout;
                    tokio::spawn(serve(pending, state, timeout));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }
}

/// Completes the upgrade for one accepted socket, then runs its session.
async fn serve<S, C>(
    pending: PendingWebSocket,
    state: Arc<ServerState<S, C>>,
    timeout: Duration,
) where
    S: ScoreStore,
    C: Codec,
{
    let peer = pending.peer_addr();
    let conn = match pending.upgrade(timeout).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(%peer, error = %e, "websocket handshake failed");
            return;
        }
    };
    if let Err(e) = handle_connection(conn, state).await {
        tracing::error!(%peer, error = %e, "connection ended with error");
    }
}
