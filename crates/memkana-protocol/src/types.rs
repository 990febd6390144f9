//! Core protocol types for memkana's wire format.
//!
//! Every inbound frame is an [`Envelope`]: `{ "type": ..., "data": ... }`.
//! Decoding is two-staged on purpose. The envelope is parsed first so
//! the engine can log the `type` of a message even when its payload is
//! broken, then [`ClientMessage::from_envelope`] binds `data` to the
//! shape that `type` requires.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The anonymous label a finished game is recorded under, e.g.
/// `guest-a8Fz01Qx`.
///
/// Assigned at submission time, not at connection time, so one human
/// playing twice gets two names.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerName(pub String);

impl PlayerName {
    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PlayerName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for PlayerName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Payload of `start` and `end`: a client clock reading in epoch
/// milliseconds (`Date.now()` on the browser side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub timestamp: i64,
}

/// Payload of `pair`: the player matched `kana` with `romaji` at
/// `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub kana: String,
    pub romaji: String,
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The outer wrapper of every inbound message.
///
/// `data` defaults to `null` when absent, so `{"type":"ping"}` is a
/// well-formed envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// ClientMessage: browser → server
// ---------------------------------------------------------------------------

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// The first card was turned; the game clock starts.
    Start(Timestamp),

    /// A kana/romaji pair was matched.
    Pair(Pair),

    /// The last pair was matched; the game clock stops.
    End(Timestamp),

    /// Any `type` the server doesn't know. Kept whole so it can be logged.
    Unknown(Envelope),
}

impl ClientMessage {
    /// Binds the envelope's `data` to the payload its `type` requires.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Payload`] when a known `type` carries
    /// data of the wrong shape. Unknown types are never an error.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        match envelope.kind.as_str() {
            "start" => payload("start", envelope.data).map(Self::Start),
            "pair" => payload("pair", envelope.data).map(Self::Pair),
            "end" => payload("end", envelope.data).map(Self::End),
            _ => Ok(Self::Unknown(envelope)),
        }
    }

    /// The wire name of this message's `type`.
    pub fn kind(&self) -> &str {
        match self {
            Self::Start(_) => "start",
            Self::Pair(_) => "pair",
            Self::End(_) => "end",
            Self::Unknown(envelope) => &envelope.kind,
        }
    }
}

impl TryFrom<Envelope> for ClientMessage {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        Self::from_envelope(envelope)
    }
}

fn payload<T: DeserializeOwned>(
    kind: &'static str,
    data: serde_json::Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(data)
        .map_err(|source| ProtocolError::Payload { kind, source })
}

// ---------------------------------------------------------------------------
// ServerMessage: server → browser
// ---------------------------------------------------------------------------

/// Messages the server sends. Each is terminal: the server closes the
/// connection right after sending one.
///
/// Adjacently tagged, so `Gameover` encodes as
/// `{"type":"gameover","data":{"redirect":"..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ServerMessage {
    /// The result was recorded; the browser should navigate to `redirect`.
    Gameover { redirect: String },

    /// The result could not be recorded.
    Error { message: String },
}

// =========================================================================
// Tests
// =========================================================================
