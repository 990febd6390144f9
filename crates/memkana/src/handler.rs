//! Per-connection handler: session lifecycle and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register an empty session for the connection
//!   2. Loop: receive envelopes → bind payloads → update the session
//!   3. On `end`: record the result, reply with the redirect, stop
//!   4. On every exit: remove the session and close the socket

use std::sync::Arc;

use memkana_protocol::{ClientMessage, Codec, Envelope, Pair, ServerMessage};
use memkana_session::{Completion, Session, SessionError, SessionRegistry};
use memkana_store::ScoreStore;
use memkana_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::MemkanaError;
use crate::scoreboard::scoreboard_redirect;
use crate::server::ServerState;

/// Drop guard that removes a connection's session when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct SessionGuard {
    conn_id: ConnectionId,
    registry: Arc<SessionRegistry>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let registry = Arc::clone(&self.registry);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                registry.remove(conn_id).await;
            });
        }
    }
}

/// Whether the message loop keeps reading.
enum Flow {
    Continue,
    Finished,
}

/// Handles a single connection from accept to close.
///
/// Returns an error only for failures worth reporting upstream: a
/// receive error other than a routine disconnect, or a result that
/// could not be recorded.
pub(crate) async fn handle_connection<S, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, C>>,
) -> Result<(), MemkanaError>
where
    S: ScoreStore,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = ?conn.peer_addr(), "handling new connection");

    state.registry.register(conn_id).await;
    let _guard = SessionGuard {
        conn_id,
        registry: Arc::clone(&state.registry),
    };

    let result = message_loop(&conn, &state).await;

    state.registry.remove(conn_id).await;
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }

    // _guard drops here; the session is already gone, so its removal
    // is a no-op.
    result
}

async fn message_loop<S, C>(
    conn: &WebSocketConnection,
    state: &ServerState<S, C>,
) -> Result<(), MemkanaError>
where
    S: ScoreStore,
    C: Codec,
{
    let conn_id = conn.id();

    loop {
        let received = match state.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::info!(
                        %conn_id,
                        idle_ms = limit.as_millis() as u64,
                        "connection idle, closing"
                    );
                    return Ok(());
                }
            },
            None => conn.recv().await,
        };

        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) if e.is_expected_close() => {
                tracing::debug!(%conn_id, error = %e, "connection dropped");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "dropping undecodable message");
                continue;
            }
        };

        let message = match ClientMessage::from_envelope(envelope) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "dropping malformed payload");
                continue;
            }
        };

        match dispatch(conn, state, message).await? {
            Flow::Continue => {}
            Flow::Finished => return Ok(()),
        }
    }
}

async fn dispatch<S, C>(
    conn: &WebSocketConnection,
    state: &ServerState<S, C>,
    message: ClientMessage,
) -> Result<Flow, MemkanaError>
where
    S: ScoreStore,
    C: Codec,
{
    let conn_id = conn.id();
    let registry = &state.registry;

    match message {
        ClientMessage::Start(ts) => {
            match registry.update(conn_id, |s| s.start(ts.timestamp)).await {
                Ok(Ok(Some(previous))) => tracing::warn!(
                    %conn_id,
                    previous,
                    timestamp = ts.timestamp,
                    "start received twice, keeping the latest"
                ),
                Ok(Ok(None)) => {
                    tracing::debug!(%conn_id, timestamp = ts.timestamp, "game started")
                }
                Ok(Err(e)) | Err(e) => dropped(conn_id, "start", &e),
            }
            Ok(Flow::Continue)
        }

        ClientMessage::Pair(pair) => {
            match registry.update(conn_id, |s| record_pair(s, pair)).await {
                Ok(Ok((count, before_start))) => {
                    if before_start {
                        tracing::warn!(%conn_id, count, "pair received before start");
                    } else {
                        tracing::debug!(%conn_id, count, "pair recorded");
                    }
                }
                Ok(Err(e)) | Err(e) => dropped(conn_id, "pair", &e),
            }
            Ok(Flow::Continue)
        }

        ClientMessage::End(ts) => {
            match registry.update(conn_id, |s| s.finish(ts.timestamp)).await {
                Ok(Ok(completion)) => {
                    finish_game(conn, state, completion).await?;
                    Ok(Flow::Finished)
                }
                Ok(Err(e)) | Err(e) => {
                    dropped(conn_id, "end", &e);
                    Ok(Flow::Continue)
                }
            }
        }

        ClientMessage::Unknown(envelope) => {
            tracing::info!(
                %conn_id,
                kind = %envelope.kind,
                data = %envelope.data,
                "ignoring unknown message type"
            );
            Ok(Flow::Continue)
        }
    }
}

/// Appends the pair and reports `(pairs so far, arrived before start)`.
fn record_pair(
    session: &mut Session,
    pair: Pair,
) -> Result<(usize, bool), SessionError> {
    let before_start = session.start_timestamp().is_none();
    session.record_pair(pair)?;
    Ok((session.pairs().len(), before_start))
}

/// Records the finished game and sends the terminal reply.
///
/// A store failure still gets a reply, so the browser can show it, and is
/// then returned for the accept loop to log.
async fn finish_game<S, C>(
    conn: &WebSocketConnection,
    state: &ServerState<S, C>,
    completion: Completion,
) -> Result<(), MemkanaError>
where
    S: ScoreStore,
    C: Codec,
{
    let conn_id = conn.id();
    let duration_ms = completion.duration.as_millis() as u64;

    if let Some(anomaly) = completion.anomaly {
        tracing::warn!(%conn_id, ?anomaly, "implausible timestamps, recording zero duration");
    }

    match state.store.insert_result(completion.duration).await {
        Ok(player) => {
            tracing::info!(%conn_id, %player, duration_ms, "game finished");
            let reply = ServerMessage::Gameover {
                redirect: scoreboard_redirect(&player),
            };
            send_reply(conn, &state.codec, &reply).await
        }
        Err(e) => {
            let reply = ServerMessage::Error {
                message: e.to_string(),
            };
            if let Err(send_err) = send_reply(conn, &state.codec, &reply).await {
                tracing::debug!(%conn_id, error = %send_err, "could not report store failure");
            }
            Err(e.into())
        }
    }
}

async fn send_reply(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    message: &ServerMessage,
) -> Result<(), MemkanaError> {
    let text = codec.encode(message)?;
    conn.send(&text).await?;
    Ok(())
}

fn dropped(conn_id: ConnectionId, kind: &str, error: &SessionError) {
    match error {
        SessionError::NotFound(_) => {
            tracing::debug!(%conn_id, kind, "no session, dropping message")
        }
        other => tracing::warn!(%conn_id, kind, error = %other, "dropping message"),
    }
}
