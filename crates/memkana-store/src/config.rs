//! Connection parameters for the Postgres store, read from the
//! environment.

use std::fmt;
use std::time::Duration;

use crate::ConfigError;

pub const ENV_HOST: &str = "POSTGRES_HOST";
pub const ENV_PORT: &str = "POSTGRES_PORT";
pub const ENV_USER: &str = "POSTGRES_USER";
pub const ENV_PASSWORD: &str = "POSTGRES_PASSWORD";
pub const ENV_DB: &str = "POSTGRES_DB";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;

/// How long a single connection attempt may take before it counts as
/// failed and the retry loop backs off.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Postgres connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database host (default: localhost)
    pub host: String,
    /// Database port (default: 5432)
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl StoreConfig {
    /// Loads the configuration from the process environment, after
    /// applying a `.env` file if one exists.
    ///
    /// # Errors
    /// [`ConfigError::Missing`] if user, password or database name is
    /// not set; [`ConfigError::InvalidPort`] if the port doesn't parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary lookup function.
    ///
    /// Values are trimmed of surrounding whitespace and control
    /// characters; env files written on Windows leave a trailing `\r`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| clean(&v));
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let host = get(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(ENV_PORT) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host,
            port,
            user: required(ENV_USER)?,
            password: required(ENV_PASSWORD)?,
            dbname: required(ENV_DB)?,
        })
    }

    /// Builds the `tokio-postgres` connection configuration.
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.host)
            .port(self.port)
            .user(&self.user)
            .password(&self.password)
            .dbname(&self.dbname)
            .application_name("memkana")
            .connect_timeout(CONNECT_TIMEOUT);
        pg
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .finish()
    }
}

fn clean(value: &str) -> String {
    value
        .trim_matches(|c: char| c.is_whitespace() || c.is_control())
        .to_string()
}
