//! Codec trait and implementations for serializing/deserializing frames.
//!
//! The gateway never hard-codes a wire format: the connection handler holds
//! something that implements [`Codec`] and goes through it for every control
//! frame. [`JsonCodec`] is the only implementation today, matching what
//! browser clients send.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a single codec value is shared by every
/// connection task through the gateway state.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use wsgate_protocol::{Codec, HandshakeFrame, JsonCodec, MemberId};
///
/// let codec = JsonCodec;
/// let frame: HandshakeFrame = codec
///     .decode(br#"{"member_id": 123456, "token": "654321"}"#)
///     .unwrap();
/// assert_eq!(frame.member_id, MemberId(123456));
///
/// let bytes = codec.encode(&frame).unwrap();
/// assert_eq!(codec.decode::<HandshakeFrame>(&bytes).unwrap(), frame);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

/// Reads a pushed frame the way clients do.
///
/// Push callers may wrap their payload one level deep as
/// `{"text": "<json-encoded string>"}`. If the frame carries a string
/// `text` field, that string is parsed as JSON and returned; otherwise the
/// frame itself is. Exactly one layer is unwrapped.
///
/// # Errors
/// Returns `ProtocolError::Decode` if the frame, or its `text` field, is
/// not valid JSON.
#[cfg(feature = "json")]
pub fn unwrap_text(frame: &[u8]) -> Result<serde_json::Value, ProtocolError> {
    let value: serde_json::Value = serde_json::from_slice(frame).map_err(ProtocolError::Decode)?;
    match value.get("text").and_then(serde_json::Value::as_str) {
        Some(text) => serde_json::from_str(text).map_err(ProtocolError::Decode),
        None => Ok(value),
    }
}
