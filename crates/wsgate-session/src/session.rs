//! Lifecycle state of a single connection.

use wsgate_protocol::MemberId;

/// Where a connection is in its life.
///
/// ```text
///   Unauthenticated ──(valid handshake)──→ Authenticated
///          │                                    │
///          └──(bad handshake / close)──→ Closed ←──(close / bad frame)
/// ```
///
/// - **Unauthenticated**: just accepted. The only frame it may send is a
///   handshake; it holds no identity and is in no registry index.
/// - **Authenticated**: registered under exactly one member, which never
///   changes for the rest of the connection's life.
/// - **Closed**: terminal. Reached once; any registry entry has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Unauthenticated,
    Authenticated { member_id: MemberId },
    Closed,
}

impl ConnectionState {
    /// The owning member, if authenticated.
    pub fn member_id(&self) -> Option<MemberId> {
        match self {
            Self::Authenticated { member_id } => Some(*member_id),
            _ => None,
        }
    }
}
