//! Connection abstraction layer for wsgate.
//!
//! Provides the [`Connection`] trait over the socket a client holds open
//! with the gateway. The rest of the workspace only ever sees frames as
//! byte slices; it never touches sockets directly. Accepting and upgrading
//! sockets is left to the HTTP server, which does it once per connection
//! in that connection's own task.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketConnection`] over an upgraded
//!   `axum` WebSocket

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
///
/// Unique for the lifetime of the process. The session registry keys its
/// per-connection state on this, so two sockets from the same peer address
/// never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw counter value, as handed out on upgrade.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One client's bidirectional frame channel.
///
/// Sending and receiving are independent: a task may be parked in
/// [`recv`](Connection::recv) while a push is written with
/// [`send`](Connection::send).
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes one whole frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Next data frame from the client, or `Ok(None)` once the client has
    /// hung up. Control frames never surface here.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts the closing handshake. Pending `recv` calls then yield `None`.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;
}
