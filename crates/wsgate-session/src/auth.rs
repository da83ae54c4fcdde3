//! Authentication gate for new connections.
//!
//! wsgate doesn't store credentials. Whether a (member, token) pair is
//! valid is decided by an external user/token store, plugged in through
//! the [`Authenticator`] trait. The [`AuthGate`] wraps that collaborator
//! with the gateway's own policy (anonymous connections are refused
//! without asking the store) and performs the registration side effect,
//! so a connection is either fully admitted or not registered at all.

use std::sync::Arc;

use wsgate_protocol::{HandshakeFrame, MemberId};
use wsgate_transport::ConnectionId;

use crate::{AuthError, Outbox, SessionError, SessionRegistry};

/// Checks a member's token against the authoritative credential store.
///
/// # Trait bounds
///
/// - `Send + Sync` → one authenticator is shared by every connection task.
/// - `'static` → it lives as long as the gateway.
///
/// # Example
///
/// ```rust
/// use wsgate_protocol::MemberId;
/// use wsgate_session::Authenticator;
///
/// /// Accepts a token only if it is the member id written backwards.
/// struct ReversedIdAuthenticator;
///
/// impl Authenticator for ReversedIdAuthenticator {
///     async fn validate(&self, member_id: MemberId, token: &str) -> bool {
///         let expected: String = member_id.to_string().chars().rev().collect();
///         token == expected
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns `true` if `token` is valid for `member_id`.
    ///
    /// Only called for non-anonymous member ids.
    fn validate(
        &self,
        member_id: MemberId,
        token: &str,
    ) -> impl std::future::Future<Output = bool> + Send;
}

/// Admits or rejects connections based on their handshake frame.
pub struct AuthGate<A: Authenticator> {
    authenticator: A,
    registry: Arc<SessionRegistry>,
}

impl<A: Authenticator> AuthGate<A> {
    /// Creates a gate that registers admitted connections in `registry`.
    pub fn new(authenticator: A, registry: Arc<SessionRegistry>) -> Self {
        Self {
            authenticator,
            registry,
        }
    }

    /// Applies the admission policy to a claimed identity.
    ///
    /// # Errors
    /// - [`AuthError::Anonymous`]: the member id is the anonymous sentinel
    ///   (the token is not looked at).
    /// - [`AuthError::InvalidToken`]: the authenticator refused the token.
    pub async fn authenticate(&self, member_id: MemberId, token: &str) -> Result<MemberId, AuthError> {
        if member_id.is_anonymous() {
            return Err(AuthError::Anonymous);
        }
        if !self.authenticator.validate(member_id, token).await {
            return Err(AuthError::InvalidToken(member_id));
        }
        Ok(member_id)
    }

    /// Authenticates a handshake and, on success, registers the connection
    /// with an empty subscription set.
    ///
    /// On any error nothing is registered.
    pub async fn admit(
        &self,
        conn_id: ConnectionId,
        handshake: &HandshakeFrame,
        outbox: Outbox,
    ) -> Result<MemberId, SessionError> {
        let member_id = match self.authenticate(handshake.member_id, &handshake.token).await {
            Ok(member_id) => member_id,
            Err(e) => {
                tracing::info!(%conn_id, member_id = %handshake.member_id, error = %e, "handshake rejected");
                return Err(e.into());
            }
        };

        self.registry.register(conn_id, member_id, outbox)?;
        tracing::info!(%conn_id, %member_id, "member authenticated");
        Ok(member_id)
    }

    /// The registry admitted connections are registered in.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}
