//! In-process [`ScoreStore`] for tests and local play without Postgres.

use std::sync::Arc;
use std::time::Duration;

use memkana_protocol::PlayerName;
use memkana_session::identity::guest_name;
use tokio::sync::Mutex;

use crate::{PlayerRank, PlayerTime, ScoreStore, StoreError};

/// Keeps every row in a `Vec`, in insertion order.
///
/// Cloning is cheap and clones share the same rows, so a test can hand
/// one clone to the server and inspect another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<Vec<PlayerTime>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every row in insertion order.
    pub async fn rows(&self) -> Vec<PlayerTime> {
        self.rows.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

impl ScoreStore for MemoryStore {
    async fn insert_result(
        &self,
        duration: Duration,
    ) -> Result<PlayerName, StoreError> {
        let player = guest_name();
        self.rows.lock().await.push(PlayerTime {
            player: player.clone(),
            duration,
        });
        tracing::debug!(%player, duration_ms = duration.as_millis() as u64, "result recorded");
        Ok(player)
    }

    async fn list_top(&self, n: usize) -> Result<Vec<PlayerTime>, StoreError> {
        let mut rows = self.rows.lock().await.clone();
        rows.sort_by_key(|row| row.duration);
        rows.truncate(n);
        Ok(rows)
    }

    async fn rank_of(&self, player: &str) -> Result<PlayerRank, StoreError> {
        let rows = self.rows.lock().await;
        let row = rows
            .iter()
            .find(|row| row.player.as_str() == player)
            .ok_or_else(|| StoreError::NotFound(PlayerName::from(player)))?;
        let rank = rows
            .iter()
            .filter(|other| other.duration <= row.duration)
            .count() as u64;
        Ok(PlayerRank {
            player: row.player.clone(),
            duration: row.duration,
            rank,
        })
    }
}
