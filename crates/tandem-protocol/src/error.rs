//! Protocol-layer errors.

/// Errors raised while turning messages into bytes and back.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The bytes were malformed, truncated, or of the wrong shape.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// Well-formed, but not allowed at this point of the conversation
    /// (e.g. a request before the handshake).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
