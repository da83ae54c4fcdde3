//! Error types for the protocol layer.
//!
//! Each crate in wsgate defines its own error enum. A `ProtocolError`
//! always means a frame could not be turned into (or out of) one of the
//! wire types; it never means a socket or registry problem.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, or a frame
    /// of the wrong shape for the connection's current state.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but violates a protocol rule, e.g. an empty app name.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
