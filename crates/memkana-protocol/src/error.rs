//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// None of these are fatal to a session: the engine drops the offending
/// message and waits for the next one.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of an outbound message failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame is not a `{type, data}` envelope.
    ///
    /// Common causes: malformed JSON, a missing `type` field, or a
    /// non-object top level.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The envelope was fine but its `data` doesn't match the shape
    /// its `type` requires.
    #[error("malformed {kind} payload: {source}")]
    Payload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
