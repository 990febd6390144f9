//! Scoreboard persistence for memkana.
//!
//! Finished games are written once and never updated. The server only
//! needs three operations, captured by [`ScoreStore`]:
//!
//! - [`insert_result`](ScoreStore::insert_result) stores a duration under a
//!   fresh guest name
//! - [`list_top`](ScoreStore::list_top) reads the fastest rows
//! - [`rank_of`](ScoreStore::rank_of) finds one player's standing
//!
//! [`PgStore`] talks to Postgres and retries its initial connection with
//! exponential backoff, and redials if the database later drops the
//! connection. [`MemoryStore`] keeps rows in process.

mod config;
mod error;
mod link;
mod memory;
mod postgres;
pub mod retry;
mod store;

pub use config::StoreConfig;
pub use error::{ConfigError, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use retry::RetryPolicy;
pub use store::{PlayerRank, PlayerTime, SCOREBOARD_SIZE, ScoreStore};
