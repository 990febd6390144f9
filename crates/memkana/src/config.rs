//! Server settings read from the environment.

use std::str::FromStr;
use std::time::Duration;

use memkana_store::RetryPolicy;

use crate::MemkanaError;

pub const ENV_BIND: &str = "MEMKANA_BIND";
pub const ENV_IDLE_TIMEOUT_SECS: &str = "MEMKANA_IDLE_TIMEOUT_SECS";
pub const ENV_DB_RETRIES: &str = "MEMKANA_DB_RETRIES";
pub const ENV_DB_BACKOFF_MS: &str = "MEMKANA_DB_BACKOFF_MS";

/// Where the game server listens by default.
pub const DEFAULT_BIND: &str = "0.0.0.0:1234";

/// Settings for the game server process.
///
/// Database connection parameters live in
/// [`StoreConfig`](memkana_store::StoreConfig); this holds everything
/// else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address for the WebSocket listener.
    pub bind: String,
    /// Close sessions that receive nothing for this long. `None` keeps
    /// them open until the client leaves.
    pub idle_timeout: Option<Duration>,
    /// Startup connection retries against the database.
    pub retry: RetryPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            idle_timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Loads settings from the process environment, after applying a
    /// `.env` file if one exists. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, MemkanaError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through an arbitrary lookup function.
    ///
    /// # Errors
    /// [`MemkanaError::InvalidSetting`] if a numeric setting doesn't parse.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, MemkanaError> {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind = get(ENV_BIND).unwrap_or(defaults.bind);

        let idle_secs: u64 = parse(ENV_IDLE_TIMEOUT_SECS, get(ENV_IDLE_TIMEOUT_SECS))?
            .unwrap_or(0);
        let idle_timeout = (idle_secs > 0).then(|| Duration::from_secs(idle_secs));

        let retries = parse(ENV_DB_RETRIES, get(ENV_DB_RETRIES))?
            .unwrap_or(defaults.retry.retries);
        let base_backoff = parse(ENV_DB_BACKOFF_MS, get(ENV_DB_BACKOFF_MS))?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry.base_backoff);

        Ok(Self {
            bind,
            idle_timeout,
            retry: RetryPolicy {
                retries,
                base_backoff,
            },
        })
    }
}

fn parse<T: FromStr>(
    key: &'static str,
    raw: Option<String>,
) -> Result<Option<T>, MemkanaError> {
    raw.map(|value| {
        value
            .parse()
            .map_err(|_| MemkanaError::InvalidSetting { key, value })
    })
    .transpose()
}
