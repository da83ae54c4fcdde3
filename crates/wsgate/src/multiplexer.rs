//! Per-connection protocol state machine.
//!
//! The multiplexer owns a connection's [`ConnectionState`] and decides what
//! each inbound frame means in that state. It does no I/O of its own: it
//! tells the connection handler what to write back and whether to hang up.
//!
//! ```text
//! Unauthenticated ── HandshakeFrame ──→ Authenticated ── SubscribeFrame ──→ (same)
//!        │ anything else                     │ anything else
//!        ▼                                   ▼
//!      Closed  ←─────────────────────────  Closed
//! ```
//!
//! Leaving `Authenticated` deregisters the connection. That happens in
//! [`Multiplexer::close`], which is idempotent and also runs on drop, so a
//! handler that bails out early with `?` still cleans up exactly once.

use std::sync::Arc;

use wsgate_protocol::{Codec, HandshakeFrame, MemberId, StatusFrame, SubscribeFrame};
use wsgate_session::{
    AuthError, Authenticator, ConnectionState, Outbox, RegistryError, SessionError,
};
use wsgate_transport::ConnectionId;

use crate::server::GatewayState;

/// What the handler should do after a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Keep reading; write the status frame first if there is one.
    Continue(Option<StatusFrame>),
    /// Write the status frame, then close the transport.
    Close(StatusFrame),
}

pub(crate) struct Multiplexer<A: Authenticator, C: Codec> {
    conn_id: ConnectionId,
    conn: ConnectionState,
    /// Handed to the registry on admission; `None` afterwards.
    outbox: Option<Outbox>,
    state: Arc<GatewayState<A, C>>,
}

impl<A: Authenticator, C: Codec> Multiplexer<A, C> {
    pub(crate) fn new(conn_id: ConnectionId, state: Arc<GatewayState<A, C>>, outbox: Outbox) -> Self {
        Self {
            conn_id,
            conn: ConnectionState::Unauthenticated,
            outbox: Some(outbox),
            state,
        }
    }

    pub(crate) fn conn_state(&self) -> ConnectionState {
        self.conn
    }

    /// Interprets one inbound frame. Frames arriving after `Closed` are
    /// dropped without side effects.
    pub(crate) async fn handle_frame(&mut self, data: &[u8]) -> Step {
        match self.conn {
            ConnectionState::Unauthenticated => self.handle_handshake(data).await,
            ConnectionState::Authenticated { .. } => self.handle_subscribe(data),
            ConnectionState::Closed => Step::Continue(None),
        }
    }

    async fn handle_handshake(&mut self, data: &[u8]) -> Step {
        let conn_id = self.conn_id;
        match self.admit(data).await {
            Ok(member_id) => {
                self.conn = ConnectionState::Authenticated { member_id };
                Step::Continue(self.ack(StatusFrame::hello(member_id)))
            }
            Err(err @ SessionError::Registry(_)) => {
                tracing::error!(%conn_id, error = %err, "registration failed");
                self.abort(rejection_status(&err))
            }
            Err(err) => {
                tracing::info!(%conn_id, error = %err, "handshake rejected");
                self.abort(rejection_status(&err))
            }
        }
    }

    /// Decodes the handshake frame and runs it through the gate.
    async fn admit(&mut self, data: &[u8]) -> Result<MemberId, SessionError> {
        let handshake: HandshakeFrame = self
            .state
            .codec
            .decode(data)
            .map_err(|e| AuthError::MalformedHandshake(e.to_string()))?;
        let outbox = self
            .outbox
            .take()
            .ok_or(RegistryError::AlreadyRegistered(self.conn_id))?;
        self.state.gate.admit(self.conn_id, &handshake, outbox).await
    }

    fn handle_subscribe(&mut self, data: &[u8]) -> Step {
        let conn_id = self.conn_id;
        let frame: SubscribeFrame = match self.state.codec.decode(data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "bad subscribe frame");
                return self.abort(StatusFrame::bad_subscribe());
            }
        };

        let app = frame.app;
        match self.state.gate.registry().subscribe(conn_id, app.clone()) {
            Ok(added) => {
                tracing::debug!(%conn_id, %app, added, "subscribe applied");
                Step::Continue(self.ack(StatusFrame::subscribed(&app)))
            }
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "subscribe failed");
                self.abort(StatusFrame::internal(e.to_string()))
            }
        }
    }

    /// Closes the connection and asks the handler to send `status` on the
    /// way out.
    pub(crate) fn abort(&mut self, status: StatusFrame) -> Step {
        self.close();
        Step::Close(status)
    }

    /// Moves to `Closed`, deregistering if the connection was admitted.
    ///
    /// Returns `true` only on the call that actually deregistered.
    pub(crate) fn close(&mut self) -> bool {
        let previous = std::mem::replace(&mut self.conn, ConnectionState::Closed);
        self.outbox = None;
        match previous {
            ConnectionState::Authenticated { member_id } => {
                let removed = self.state.gate.registry().deregister(self.conn_id);
                tracing::info!(conn_id = %self.conn_id, %member_id, "connection closed");
                removed
            }
            _ => false,
        }
    }

    fn ack(&self, status: StatusFrame) -> Option<StatusFrame> {
        self.state.config.acks.then_some(status)
    }
}

/// The status frame a refused handshake is answered with.
fn rejection_status(err: &SessionError) -> StatusFrame {
    match err {
        SessionError::Auth(AuthError::Anonymous) => StatusFrame::anonymous(),
        SessionError::Auth(AuthError::InvalidToken(_)) => StatusFrame::unauthorized(),
        SessionError::Auth(AuthError::MalformedHandshake(_)) => StatusFrame::missing_auth(),
        SessionError::Registry(e) => StatusFrame::internal(e.to_string()),
    }
}

impl<A: Authenticator, C: Codec> Drop for Multiplexer<A, C> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use wsgate_protocol::{AppName, JsonCodec};
    use wsgate_session::{AuthGate, Outbound, SessionRegistry};

    use super::*;
    use crate::GatewayConfig;

    struct RejectOne;

    impl Authenticator for RejectOne {
        async fn validate(&self, member_id: MemberId, _token: &str) -> bool {
            member_id != MemberId(12345)
        }
    }

    fn state(acks: bool) -> Arc<GatewayState<RejectOne, JsonCodec>> {
        let registry = Arc::new(SessionRegistry::new());
        Arc::new(GatewayState {
            gate: AuthGate::new(RejectOne, registry),
            codec: JsonCodec,
            config: GatewayConfig {
                acks,
                ..GatewayConfig::default()
            },
        })
    }

    fn new_mux(
        id: u64,
        state: &Arc<GatewayState<RejectOne, JsonCodec>>,
    ) -> (Multiplexer<RejectOne, JsonCodec>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(8);
        (Multiplexer::new(ConnectionId::new(id), Arc::clone(state), tx), rx)
    }

    fn app(name: &str) -> AppName {
        AppName::new(name).unwrap()
    }

    #[tokio::test]
    async fn test_handshake_success_authenticates_and_registers() {
        let state = state(true);
        let (mut mux, _rx) = new_mux(1, &state);

        let step = mux.handle_frame(br#"{"member_id":123456,"token":"654321"}"#).await;

        assert_eq!(step, Step::Continue(Some(StatusFrame::hello(MemberId(123456)))));
        assert_eq!(mux.conn_state().member_id(), Some(MemberId(123456)));
        assert!(state.gate.registry().contains(ConnectionId::new(1)));
    }

    #[tokio::test]
    async fn test_handshake_without_acks_is_silent() {
        let state = state(false);
        let (mut mux, _rx) = new_mux(1, &state);

        let step = mux.handle_frame(br#"{"member_id":7,"token":"t"}"#).await;

        assert_eq!(step, Step::Continue(None));
    }

    #[tokio::test]
    async fn test_subscribe_frame_before_handshake_closes() {
        let state = state(true);
        let (mut mux, _rx) = new_mux(1, &state);

        let step = mux.handle_frame(br#"{"app":"match"}"#).await;

        assert_eq!(step, Step::Close(StatusFrame::missing_auth()));
        assert_eq!(mux.conn_state(), ConnectionState::Closed);
        // Nothing was registered, so closing has nothing to deregister.
        assert!(!mux.close());
        assert_eq!(state.gate.registry().stats().connections, 0);
    }

    #[tokio::test]
    async fn test_anonymous_rejected_and_later_subscribe_ignored() {
        let state = state(true);
        let (mut mux, _rx) = new_mux(1, &state);

        let step = mux.handle_frame(br#"{"member_id":-1,"token":""}"#).await;
        assert_eq!(step, Step::Close(StatusFrame::anonymous()));

        let step = mux.handle_frame(br#"{"app":"match"}"#).await;
        assert_eq!(step, Step::Continue(None));
        assert!(state.gate.registry().lookup(MemberId(-1), &app("match")).is_empty());
        assert_eq!(state.gate.registry().stats().connections, 0);
    }

    #[tokio::test]
    async fn test_invalid_token_rejected_without_registry_entry() {
        let state = state(true);
        let (mut mux, _rx) = new_mux(1, &state);

        let step = mux.handle_frame(br#"{"member_id":12345,"token":"54321"}"#).await;

        assert_eq!(step, Step::Close(StatusFrame::unauthorized()));
        assert!(!state.gate.registry().has_member(MemberId(12345)));
    }

    #[tokio::test]
    async fn test_subscribe_after_handshake_updates_index() {
        let state = state(true);
        let (mut mux, _rx) = new_mux(1, &state);
        mux.handle_frame(br#"{"member_id":123456,"token":"654321"}"#).await;

        for name in ["match", "im", "chat"] {
            let frame = format!(r#"{{"app":"{name}"}}"#);
            let step = mux.handle_frame(frame.as_bytes()).await;
            assert_eq!(step, Step::Continue(Some(StatusFrame::subscribed(&app(name)))));
        }

        let ids = state.gate.registry().lookup(MemberId(123456), &app("im"));
        assert!(ids.contains(&ConnectionId::new(1)));
    }

    #[tokio::test]
    async fn test_malformed_frame_after_handshake_closes_and_deregisters() {
        let state = state(true);
        let (mut mux, _rx) = new_mux(1, &state);
        mux.handle_frame(br#"{"member_id":7,"token":"t"}"#).await;
        mux.handle_frame(br#"{"app":"im"}"#).await;

        let step = mux.handle_frame(b"not json").await;

        assert_eq!(step, Step::Close(StatusFrame::bad_subscribe()));
        assert!(!state.gate.registry().contains(ConnectionId::new(1)));
        assert!(state.gate.registry().lookup(MemberId(7), &app("im")).is_empty());
    }

    #[tokio::test]
    async fn test_close_deregisters_exactly_once() {
        let state = state(true);
        let (mut mux, _rx) = new_mux(1, &state);
        mux.handle_frame(br#"{"member_id":7,"token":"t"}"#).await;

        assert!(mux.close());
        assert!(!mux.close());
        assert!(!state.gate.registry().contains(ConnectionId::new(1)));
    }

    #[tokio::test]
    async fn test_drop_deregisters() {
        let state = state(true);
        {
            let (mut mux, _rx) = new_mux(1, &state);
            mux.handle_frame(br#"{"member_id":7,"token":"t"}"#).await;
            assert!(state.gate.registry().contains(ConnectionId::new(1)));
        }
        assert!(!state.gate.registry().contains(ConnectionId::new(1)));
    }

    #[tokio::test]
    async fn test_undecodable_handshake_is_missing_auth() {
        let state = state(true);
        let (mut mux, _rx) = new_mux(1, &state);

        let err = mux.admit(b"{\"member_id\":").await.unwrap_err();
        assert!(matches!(err, SessionError::Auth(AuthError::MalformedHandshake(_))));
        assert_eq!(rejection_status(&err), StatusFrame::missing_auth());
        assert_eq!(state.gate.registry().stats().connections, 0);
    }

    #[test]
    fn test_rejection_status_per_error() {
        let cases = [
            (SessionError::Auth(AuthError::Anonymous), StatusFrame::anonymous()),
            (
                SessionError::Auth(AuthError::InvalidToken(MemberId(1))),
                StatusFrame::unauthorized(),
            ),
            (
                SessionError::Auth(AuthError::MalformedHandshake("eof".into())),
                StatusFrame::missing_auth(),
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(rejection_status(&err), expected, "for {err}");
        }

        let err = SessionError::Registry(RegistryError::AlreadyRegistered(ConnectionId::new(4)));
        assert_eq!(rejection_status(&err).code, 500);
    }

    #[tokio::test]
    async fn test_second_handshake_frame_is_bad_subscribe() {
        let state = state(true);
        let (mut mux, _rx) = new_mux(1, &state);
        mux.handle_frame(br#"{"member_id":7,"token":"t"}"#).await;

        let step = mux.handle_frame(br#"{"member_id":8,"token":"t"}"#).await;

        assert_eq!(step, Step::Close(StatusFrame::bad_subscribe()));
        assert!(!state.gate.registry().has_member(MemberId(8)));
    }
}
