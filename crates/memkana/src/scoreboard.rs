//! Scoreboard reads and the fallback form submission.
//!
//! These are the operations the HTTP front-end calls. They go through
//! the same [`ScoreStore`] as the WebSocket engine, so a time submitted
//! through the form and one recorded by a live game rank side by side.

use std::time::Duration;

use memkana_protocol::PlayerName;
use memkana_store::{PlayerRank, PlayerTime, SCOREBOARD_SIZE, ScoreStore};
use serde::Serialize;

use crate::MemkanaError;

/// One line of the scoreboard, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreboardRow {
    /// Number of recorded games at least as fast as this one, so tied
    /// rows share a rank and a player's list rank matches their
    /// standing.
    pub rank: u64,
    pub player: String,
    /// `MM:SS`
    pub time: String,
}

/// Everything the scoreboard page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreboardView {
    /// Fastest games first, at most [`SCOREBOARD_SIZE`] rows.
    pub top: Vec<ScoreboardRow>,
    /// The requesting player's own standing, when one was asked for.
    pub standing: Option<ScoreboardRow>,
}

/// Loads the top games and, if `player` is given, that player's standing.
///
/// An empty `player` is treated as absent.
///
/// # Errors
/// Store failures, including
/// [`StoreError::NotFound`](memkana_store::StoreError::NotFound) for a
/// player with no recorded game.
pub async fn load_scoreboard<S: ScoreStore>(
    store: &S,
    player: Option<&str>,
) -> Result<ScoreboardView, MemkanaError> {
    let rows = store.list_top(SCOREBOARD_SIZE).await?;
    let top = ranked_rows(store, &rows).await?;

    let standing = match player.filter(|p| !p.is_empty()) {
        Some(player) => Some(standing_row(store.rank_of(player).await?)),
        None => None,
    };

    Ok(ScoreboardView { top, standing })
}

/// Assigns inclusive ranks to rows sorted fastest first.
///
/// Within the list, a tie group's rank is the count of rows up to its
/// end. When the list is full its last group may continue beyond the
/// cut, so that group's rank is asked of the store.
async fn ranked_rows<S: ScoreStore>(
    store: &S,
    rows: &[PlayerTime],
) -> Result<Vec<ScoreboardRow>, MemkanaError> {
    let full = rows.len() >= SCOREBOARD_SIZE;
    let mut ranked = Vec::with_capacity(rows.len());
    let mut groups = rows.chunk_by(|a, b| a.duration == b.duration).peekable();

    while let Some(group) = groups.next() {
        let cut_off = full && groups.peek().is_none();
        let rank = match group.first() {
            Some(first) if cut_off => store.rank_of(first.player.as_str()).await?.rank,
            _ => (ranked.len() + group.len()) as u64,
        };
        ranked.extend(group.iter().map(|row| ScoreboardRow {
            rank,
            player: row.player.0.clone(),
            time: format_time(row.duration),
        }));
    }
    Ok(ranked)
}

fn standing_row(rank: PlayerRank) -> ScoreboardRow {
    ScoreboardRow {
        rank: rank.rank,
        player: rank.player.0,
        time: format_time(rank.duration),
    }
}

/// Parses a form-submitted `MM:SS` time.
///
/// Minutes may have any number of digits; seconds must be below 60.
///
/// # Errors
/// [`MemkanaError::InvalidFormTime`] for anything else.
pub fn parse_form_time(raw: &str) -> Result<Duration, MemkanaError> {
    let invalid = || MemkanaError::InvalidFormTime(raw.to_string());

    let (minutes, seconds) = raw.trim().split_once(':').ok_or_else(invalid)?;
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(minutes) || !digits(seconds) {
        return Err(invalid());
    }

    let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
    let seconds: u64 = seconds.parse().map_err(|_| invalid())?;
    if seconds >= 60 {
        return Err(invalid());
    }

    minutes
        .checked_mul(60)
        .and_then(|m| m.checked_add(seconds))
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// Records a time submitted through the fallback form and returns the
/// scoreboard URL to redirect to.
pub async fn submit_form_time<S: ScoreStore>(
    store: &S,
    raw: &str,
) -> Result<String, MemkanaError> {
    let duration = parse_form_time(raw)?;
    let player = store.insert_result(duration).await?;
    tracing::info!(%player, time = %format_time(duration), "form time recorded");
    Ok(scoreboard_redirect(&player))
}

/// Formats a duration as `MM:SS`, dropping sub-second precision.
pub fn format_time(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// The page a player lands on after finishing a game.
pub fn scoreboard_redirect(player: &PlayerName) -> String {
    format!("/scoreboard?p={player}")
}
