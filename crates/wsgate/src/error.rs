//! Unified error type for the gateway, plus the push-path errors.

use wsgate_protocol::ProtocolError;
use wsgate_session::{AuthError, RegistryError, SessionError};
use wsgate_transport::{ConnectionId, TransportError};

/// A push request that cannot be routed. Maps to HTTP 400; never reaches
/// a WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Writing to one recipient failed.
///
/// Recovered locally by the dispatcher: the recipient is skipped and the
/// rest of the push continues.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The connection closed between lookup and write.
    #[error("connection {0} is gone")]
    ConnectionGone(ConnectionId),

    /// The connection's outbox is full: the client is not reading. The
    /// connection stays registered; only this message is dropped.
    #[error("connection {0} is not keeping up, message dropped")]
    Backpressure(ConnectionId),
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A transport-level error (send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Authentication or registry failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A listener address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A listener stopped serving.
    #[error("server failed: {0}")]
    Serve(#[source] std::io::Error),
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        Self::Session(err.into())
    }
}

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        Self::Session(err.into())
    }
}
