//! The [`ScoreStore`] trait and the rows it deals in.

use std::future::Future;
use std::time::Duration;

use memkana_protocol::PlayerName;

use crate::StoreError;

/// Number of rows on the public scoreboard.
pub const SCOREBOARD_SIZE: usize = 10;

/// One recorded game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerTime {
    pub player: PlayerName,
    pub duration: Duration,
}

/// Where a player's recorded game stands among all games.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRank {
    pub player: PlayerName,
    pub duration: Duration,
    /// 1-based. Counts every row with a duration less than or equal to
    /// this one, so tied players share the larger rank.
    pub rank: u64,
}

/// Records finished games and answers scoreboard queries.
///
/// Rows are immutable once written. Implementations must be shareable
/// across connection tasks; the server holds one for its whole lifetime.
///
/// Methods return `Send` futures so generic callers can be spawned onto
/// the multi-threaded runtime. Implementors can still write `async fn`.
pub trait ScoreStore: Send + Sync + 'static {
    /// Stores `duration` under a freshly generated guest name and
    /// returns that name.
    ///
    /// # Errors
    /// A failed write is always reported, never swallowed.
    fn insert_result(
        &self,
        duration: Duration,
    ) -> impl Future<Output = Result<PlayerName, StoreError>> + Send;

    /// Returns up to `n` rows, fastest first.
    fn list_top(
        &self,
        n: usize,
    ) -> impl Future<Output = Result<Vec<PlayerTime>, StoreError>> + Send;

    /// Looks up a player's duration and rank.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the player has no row.
    fn rank_of(
        &self,
        player: &str,
    ) -> impl Future<Output = Result<PlayerRank, StoreError>> + Send;
}

/// Converts a duration to whole nanoseconds for storage, saturating at
/// `i64::MAX` (about 292 years).
pub(crate) fn duration_to_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

/// Inverse of [`duration_to_nanos`]. Negative values read back as zero.
pub(crate) fn nanos_to_duration(nanos: i64) -> Duration {
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(0))
}
