//! Error types for the session layer.

use wsgate_protocol::MemberId;
use wsgate_transport::ConnectionId;

/// Why a handshake was refused.
///
/// Every variant ends the connection: the gate never leaves a rejected
/// connection half-registered.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The handshake claimed no identity (`member_id <= 0`).
    #[error("anonymous connections are not accepted")]
    Anonymous,

    /// The authenticator reported the token as invalid for this member.
    #[error("invalid token for member {0}")]
    InvalidToken(MemberId),

    /// The first frame was missing, late, or not a handshake frame.
    #[error("malformed handshake: {0}")]
    MalformedHandshake(String),
}

/// Errors from [`SessionRegistry`](crate::SessionRegistry) mutations.
///
/// Both indicate that the caller sequenced its calls wrongly; they are
/// surfaced to the connection rather than swallowed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// `register` was called twice for the same connection.
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    /// The connection is unknown, unauthenticated, or already deregistered.
    #[error("connection {0} is not registered")]
    NotRegistered(ConnectionId),
}

/// Anything that can go wrong while admitting a connection.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
