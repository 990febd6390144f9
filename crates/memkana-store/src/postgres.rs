//! [`ScoreStore`] backed by a single `tokio-postgres` client that is
//! redialed when the database drops it.

use std::sync::Arc;
use std::time::Duration;

use memkana_protocol::PlayerName;
use memkana_session::identity::guest_name;
use tokio_postgres::{Client, NoTls};

use crate::link::Redial;
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::store::{duration_to_nanos, nanos_to_duration};
use crate::{PlayerRank, PlayerTime, ScoreStore, StoreConfig, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS player_times (
    player      TEXT PRIMARY KEY,
    duration_ns BIGINT NOT NULL CHECK (duration_ns >= 0),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS player_times_duration_idx ON player_times (duration_ns);
";

const INSERT: &str = "INSERT INTO player_times (player, duration_ns) VALUES ($1, $2)";
const LIST_TOP: &str =
    "SELECT player, duration_ns FROM player_times ORDER BY duration_ns, created_at LIMIT $1";
const SELECT_ONE: &str = "SELECT duration_ns FROM player_times WHERE player = $1";
const COUNT_AT_MOST: &str = "SELECT count(*) FROM player_times WHERE duration_ns <= $1";

/// Postgres-backed score store.
///
/// The client pipelines requests internally, so one connection serves
/// every game task. If the database restarts, the next request dials a
/// new connection once; if that fails the request gets
/// [`StoreError::Unavailable`] and the one after tries again.
pub struct PgStore {
    pg: tokio_postgres::Config,
    client: Redial<Client>,
}

impl PgStore {
    /// Connects, retrying per `policy` while the database comes up.
    ///
    /// # Errors
    /// [`StoreError::ConnectionTimeout`] once every attempt has failed.
    pub async fn connect(
        config: &StoreConfig,
        policy: RetryPolicy,
    ) -> Result<Self, StoreError> {
        let pg = config.to_pg_config();
        tracing::info!(
            host = %config.host,
            port = config.port,
            dbname = %config.dbname,
            retries = policy.retries,
            "connecting to postgres"
        );

        let client = retry_with_backoff(policy, |_| open(&pg)).await?;

        tracing::info!("connected to postgres");
        Ok(Self {
            pg,
            client: Redial::new(client),
        })
    }

    /// Creates the results table and its index if they don't exist.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.client()
            .await?
            .batch_execute(SCHEMA)
            .await
            .map_err(StoreError::Query)
    }

    async fn client(&self) -> Result<Arc<Client>, StoreError> {
        self.client.get(|| open(&self.pg)).await
    }
}

/// One connection attempt. The connection future is driven on its own
/// task for as long as the client lives.
async fn open(pg: &tokio_postgres::Config) -> Result<Client, StoreError> {
    let (client, connection) = pg.connect(NoTls).await.map_err(StoreError::Connect)?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "postgres connection error");
        }
    });

    client
        .simple_query("SELECT 1")
        .await
        .map_err(StoreError::Connect)?;
    Ok(client)
}

impl ScoreStore for PgStore {
    async fn insert_result(
        &self,
        duration: Duration,
    ) -> Result<PlayerName, StoreError> {
        let client = self.client().await?;
        let player = guest_name();
        let nanos = duration_to_nanos(duration);

        client
            .execute(INSERT, &[&player.as_str(), &nanos])
            .await
            .map_err(StoreError::Write)?;

        tracing::debug!(%player, duration_ns = nanos, "result recorded");
        Ok(player)
    }

    async fn list_top(&self, n: usize) -> Result<Vec<PlayerTime>, StoreError> {
        let client = self.client().await?;
        let limit = i64::try_from(n).unwrap_or(i64::MAX);

        let rows = client
            .query(LIST_TOP, &[&limit])
            .await
            .map_err(StoreError::Query)?;

        rows.iter()
            .map(|row| {
                let player: String = row.try_get(0).map_err(StoreError::Query)?;
                let nanos: i64 = row.try_get(1).map_err(StoreError::Query)?;
                Ok(PlayerTime {
                    player: PlayerName(player),
                    duration: nanos_to_duration(nanos),
                })
            })
            .collect()
    }

    async fn rank_of(&self, player: &str) -> Result<PlayerRank, StoreError> {
        let client = self.client().await?;

        let row = client
            .query_opt(SELECT_ONE, &[&player])
            .await
            .map_err(StoreError::Query)?
            .ok_or_else(|| StoreError::NotFound(PlayerName::from(player)))?;
        let nanos: i64 = row.try_get(0).map_err(StoreError::Query)?;

        let count: i64 = client
            .query_one(COUNT_AT_MOST, &[&nanos])
            .await
            .and_then(|row| row.try_get(0))
            .map_err(StoreError::Query)?;

        Ok(PlayerRank {
            player: PlayerName::from(player),
            duration: nanos_to_duration(nanos),
            rank: u64::try_from(count).unwrap_or(0),
        })
    }
}
