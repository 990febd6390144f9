//! The session registry: every in-progress game, keyed by connection.
//!
//! # Concurrency note
//!
//! The whole map sits behind one `tokio::sync::Mutex`. Each connection
//! task only ever touches its own entry, and the expected number of
//! simultaneous players is small, so a single lock is simpler than
//! sharding and keeps read-after-write visibility trivial: an `update`
//! runs its closure while holding the lock, so two events for the same
//! connection can never interleave or be lost.
//!
//! The registry is an ordinary value. The server owns one and hands an
//! `Arc` to every connection task.

use std::collections::HashMap;

use memkana_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::{Session, SessionError};

/// Tracks the [`Session`] of every open connection.
///
/// ## Lifecycle
///
/// ```text
/// accept ──→ register() ──→ update()* ──→ remove()
///                                           ↑
///                           close / end / idle timeout
/// ```
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ConnectionId, Session>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty session for a freshly accepted connection.
    ///
    /// Connection ids are never reused, so this never replaces a live
    /// session in practice; if it did, the old one is dropped.
    pub async fn register(&self, conn_id: ConnectionId) {
        let replaced = self
            .sessions
            .lock()
            .await
            .insert(conn_id, Session::new());
        if replaced.is_some() {
            tracing::warn!(%conn_id, "replaced an existing session");
        }
        tracing::debug!(%conn_id, "session registered");
    }

    /// Runs `f` on the connection's session while holding the lock.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the connection has no
    /// session, e.g. a message that raced the teardown.
    pub async fn update<R>(
        &self,
        conn_id: ConnectionId,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&conn_id)
            .ok_or(SessionError::NotFound(conn_id))?;
        Ok(f(session))
    }

    /// Removes and returns the connection's session.
    ///
    /// Removing a connection that has no session is a no-op.
    pub async fn remove(&self, conn_id: ConnectionId) -> Option<Session> {
        let removed = self.sessions.lock().await.remove(&conn_id);
        if removed.is_some() {
            tracing::debug!(%conn_id, "session unregistered");
        }
        removed
    }

    /// Returns a snapshot of the connection's session.
    pub async fn get(&self, conn_id: ConnectionId) -> Option<Session> {
        self.sessions.lock().await.get(&conn_id).cloned()
    }

    /// Returns the ids of every registered connection, in no particular
    /// order.
    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        self.sessions.lock().await.keys().copied().collect()
    }

    /// Returns the number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Returns `true` if no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
