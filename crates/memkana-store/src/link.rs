//! Reconnect-on-demand for the database client.
//!
//! `tokio-postgres` never reconnects on its own: once the server goes
//! away the client stays closed. [`Redial`] holds the current client and
//! swaps in a fresh one the next time someone asks for it.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_postgres::Client;

use crate::StoreError;

/// A connection that can tell whether it is still usable.
pub(crate) trait Link: Send + Sync + 'static {
    fn is_closed(&self) -> bool;
}

impl Link for Client {
    fn is_closed(&self) -> bool {
        Client::is_closed(self)
    }
}

/// The current link, replaced once when it is found closed.
///
/// Callers share the open link through a read lock. The first caller to
/// find it closed takes the write lock and redials; callers queued
/// behind it see the new link and do not dial again.
pub(crate) struct Redial<L> {
    current: RwLock<Arc<L>>,
}

impl<L: Link> Redial<L> {
    pub(crate) fn new(link: L) -> Self {
        Self {
            current: RwLock::new(Arc::new(link)),
        }
    }

    /// Returns an open link, calling `reopen` if the current one has
    /// closed.
    ///
    /// # Errors
    /// [`StoreError::Unavailable`] if `reopen` fails. The closed link is
    /// kept, so the next call tries again.
    pub(crate) async fn get<F, Fut>(&self, reopen: F) -> Result<Arc<L>, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<L, StoreError>>,
    {
        {
            let current = self.current.read().await;
            if !current.is_closed() {
                return Ok(Arc::clone(&current));
            }
        }

        let mut current = self.current.write().await;
        if !current.is_closed() {
            return Ok(Arc::clone(&current));
        }

        tracing::warn!("postgres connection closed, reconnecting");
        match reopen().await {
            Ok(link) => {
                *current = Arc::new(link);
                tracing::info!("reconnected to postgres");
                Ok(Arc::clone(&current))
            }
            Err(e) => {
                tracing::warn!(error = %e, "reconnect failed");
                Err(StoreError::Unavailable(format!("reconnect failed: {e}")))
            }
        }
    }
}
