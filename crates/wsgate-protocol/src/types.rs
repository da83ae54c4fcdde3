//! Core protocol types for wsgate's wire format.
//!
//! Everything a client sends over its WebSocket, and everything the gateway
//! sends back on its own behalf, is one of the types below. Pushed payloads
//! are the exception: they are forwarded as opaque bytes and never pass
//! through these types on the way out.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a member (an authenticated principal).
///
/// Serialized as a bare integer: `MemberId(42)` is `42` on the wire.
/// Zero and negative values are the "anonymous" sentinel; clients that do
/// not claim an identity send `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub i64);

impl MemberId {
    /// The value clients send when they claim no identity.
    pub const ANONYMOUS: MemberId = MemberId(-1);

    /// Returns `true` if this id does not name a real member.
    pub fn is_anonymous(self) -> bool {
        self.0 <= 0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a logical channel multiplexed over a connection ("match", "im",
/// "chat", ...).
///
/// The set of apps is open. The only rule is that a name is not empty,
/// which is enforced on construction and on deserialization, so an
/// `AppName` in hand is always valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppName(String);

impl AppName {
    /// Validates and wraps an app name.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] if `name` is empty.
    pub fn new(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ProtocolError::InvalidMessage("app name must not be empty".into()));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AppName {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AppName> for String {
    fn from(value: AppName) -> Self {
        value.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Client → gateway frames
// ---------------------------------------------------------------------------

/// The first frame of every connection: `{"member_id": 123, "token": "..."}`.
///
/// `token` may be omitted and then reads as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeFrame {
    pub member_id: MemberId,
    #[serde(default)]
    pub token: String,
}

/// Every later frame: `{"app": "im"}` subscribes the connection to `im`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeFrame {
    pub app: AppName,
}

// ---------------------------------------------------------------------------
// Gateway → client frames
// ---------------------------------------------------------------------------

/// Status reply the gateway writes in response to control frames.
///
/// Codes follow HTTP conventions: `200` for success, `4xx` when the client
/// got something wrong, `500` when the gateway did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFrame {
    pub code: u16,
    pub message: String,
}

impl StatusFrame {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Sent after a successful handshake.
    pub fn hello(member_id: MemberId) -> Self {
        Self::new(200, format!("hello {member_id}"))
    }

    /// Sent after a subscribe frame was applied.
    pub fn subscribed(app: &AppName) -> Self {
        Self::new(200, format!("subscribe {app} success"))
    }

    /// The first frame was missing, late, or not a handshake.
    pub fn missing_auth() -> Self {
        Self::new(400, "missing auth message")
    }

    /// The handshake claimed no identity.
    pub fn anonymous() -> Self {
        Self::new(401, "anonymous")
    }

    /// The authenticator rejected the token.
    pub fn unauthorized() -> Self {
        Self::new(401, "unauthorized")
    }

    /// A frame after the handshake was not a valid subscribe frame.
    pub fn bad_subscribe() -> Self {
        Self::new(400, "bad subscribe message")
    }

    /// The gateway failed to apply a valid request.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }
}

// ---------------------------------------------------------------------------
// Push ingress
// ---------------------------------------------------------------------------

/// The routing fields of a push request body.
///
/// Only these two fields are read; everything else in the body (`text`,
/// or any raw payload fields) is carried along untouched because the
/// gateway forwards the original bytes, not this struct.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushHeader {
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub member_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_id_serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&MemberId(123456)).unwrap(), "123456");
    }

    #[test]
    fn test_member_id_anonymous_sentinels() {
        assert!(MemberId::ANONYMOUS.is_anonymous());
        assert!(MemberId(0).is_anonymous());
        assert!(!MemberId(12345).is_anonymous());
    }

    #[test]
    fn test_app_name_rejects_empty() {
        assert!(AppName::new("").is_err());
        assert_eq!(AppName::new("chat").unwrap().as_str(), "chat");
    }

    #[test]
    fn test_handshake_frame_parses_client_shape() {
        let frame: HandshakeFrame =
            serde_json::from_str(r#"{"member_id": 123456, "token": "654321"}"#).unwrap();
        assert_eq!(frame.member_id, MemberId(123456));
        assert_eq!(frame.token, "654321");
    }

    #[test]
    fn test_handshake_frame_token_defaults_to_empty() {
        let frame: HandshakeFrame = serde_json::from_str(r#"{"member_id": -1}"#).unwrap();
        assert!(frame.member_id.is_anonymous());
        assert!(frame.token.is_empty());
    }

    #[test]
    fn test_subscribe_frame_is_not_a_handshake() {
        let result = serde_json::from_str::<HandshakeFrame>(r#"{"app": "match"}"#);
        assert!(result.is_err(), "a subscribe frame must not pass as a handshake");
    }

    #[test]
    fn test_subscribe_frame_rejects_empty_app() {
        assert!(serde_json::from_str::<SubscribeFrame>(r#"{"app": ""}"#).is_err());
        assert!(serde_json::from_str::<SubscribeFrame>(r#"{"app": 7}"#).is_err());
        let frame: SubscribeFrame = serde_json::from_str(r#"{"app": "im"}"#).unwrap();
        assert_eq!(frame.app.as_str(), "im");
    }

    #[test]
    fn test_status_frame_wire_shape() {
        let json = serde_json::to_value(StatusFrame::hello(MemberId(123456))).unwrap();
        assert_eq!(json, serde_json::json!({"code": 200, "message": "hello 123456"}));

        let app = AppName::new("im").unwrap();
        assert_eq!(StatusFrame::subscribed(&app).message, "subscribe im success");
        assert_eq!(StatusFrame::unauthorized().code, 401);
    }

    #[test]
    fn test_push_header_ignores_payload_fields() {
        let header: PushHeader = serde_json::from_str(
            r#"{"app":"im","member_id":123456,"text":"{\"hello\":123456}","extra":[1,2]}"#,
        )
        .unwrap();
        assert_eq!(header.app, "im");
        assert_eq!(header.member_id, Some(123456));
    }

    #[test]
    fn test_push_header_missing_fields_default() {
        let header: PushHeader = serde_json::from_str(r#"{"text":"x"}"#).unwrap();
        assert!(header.app.is_empty());
        assert_eq!(header.member_id, None);
    }
}
