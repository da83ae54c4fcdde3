//! Per-connection handler: handshake, subscriptions and outbound pushes.
//!
//! Each connection is upgraded and handled in its own Tokio task, so a
//! peer that stalls mid-upgrade or mid-handshake never holds up anyone
//! else. The flow is:
//!   0. Upgrade `GET /` to a WebSocket
//!   1. Wait for the handshake frame (bounded by the handshake timeout)
//!   2. Loop: read subscribe frames from the client, and write pushes
//!      arriving on the connection's outbox
//!   3. On close, error or timeout: deregister exactly once

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use tokio::sync::mpsc;
use tokio::time::Instant;
use wsgate_protocol::{Codec, StatusFrame};
use wsgate_session::{Authenticator, Outbound};
use wsgate_transport::{Connection, TransportError, WebSocketConnection};

use crate::GatewayError;
use crate::multiplexer::{Multiplexer, Step};
use crate::server::GatewayState;

/// Outcome of waiting for the next client frame.
enum Inbound {
    Frame(Vec<u8>),
    Closed,
    Idle,
    Failed(TransportError),
}

/// `GET /`: upgrades the request and hands the socket to
/// [`handle_connection`].
pub(crate) async fn upgrade<A, C>(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<GatewayState<A, C>>>,
) -> Response
where
    A: Authenticator,
    C: Codec + 'static,
{
    ws.on_upgrade(move |socket| async move {
        let conn = WebSocketConnection::new(socket, peer);
        if let Err(e) = handle_connection(conn, state).await {
            tracing::debug!(error = %e, "connection ended with error");
        }
    })
}

/// Handles a single connection from upgrade to close.
async fn handle_connection<A, C>(
    conn: WebSocketConnection,
    state: Arc<GatewayState<A, C>>,
) -> Result<(), GatewayError>
where
    A: Authenticator,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (outbox, mut inbox) = mpsc::channel::<Outbound>(state.config.outbox_capacity.max(1));
    let mut mux = Multiplexer::new(conn_id, Arc::clone(&state), outbox);

    // --- Step 1: Handshake ---
    let step = match tokio::time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => mux.handle_frame(&data).await,
        Ok(Ok(None)) => {
            tracing::debug!(%conn_id, "closed before handshake");
            mux.close();
            return Ok(());
        }
        Ok(Err(e)) => {
            mux.close();
            return Err(e.into());
        }
        Err(_) => {
            tracing::info!(%conn_id, "handshake timed out");
            mux.abort(StatusFrame::missing_auth())
        }
    };
    if !apply(&conn, &state.codec, step).await? {
        return Ok(());
    }

    // --- Step 2: Subscriptions and pushes ---
    // Only client frames count as activity; pushes don't keep a
    // connection alive.
    let idle_timeout = state.config.idle_timeout;
    let mut idle_deadline = idle_timeout.map(|limit| Instant::now() + limit);
    loop {
        tokio::select! {
            inbound = next_inbound(&conn, idle_deadline) => match inbound {
                Inbound::Frame(data) => {
                    idle_deadline = idle_timeout.map(|limit| Instant::now() + limit);
                    let step = mux.handle_frame(&data).await;
                    if !apply(&conn, &state.codec, step).await? {
                        break;
                    }
                }
                Inbound::Closed => {
                    tracing::debug!(%conn_id, "connection closed cleanly");
                    break;
                }
                Inbound::Idle => {
                    tracing::info!(%conn_id, "connection idle, closing");
                    let _ = conn.close().await;
                    break;
                }
                Inbound::Failed(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break;
                }
            },
            outbound = inbox.recv() => match outbound {
                Some(payload) => conn.send(&payload).await?,
                // Deregistered elsewhere; nothing will arrive any more.
                None => break,
            },
        }
    }

    tracing::debug!(%conn_id, state = ?mux.conn_state(), "connection task finishing");
    // Also runs on drop if a send above bailed out with `?`.
    mux.close();
    Ok(())
}

/// Writes the step's status frame, if any. Returns `false` once the
/// connection has been closed.
async fn apply<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    step: Step,
) -> Result<bool, GatewayError> {
    match step {
        Step::Continue(status) => {
            if let Some(status) = status {
                conn.send(&codec.encode(&status)?).await?;
            }
            Ok(true)
        }
        Step::Close(status) => {
            // The peer may already be gone; closing is best-effort.
            if let Err(e) = conn.send(&codec.encode(&status)?).await {
                tracing::debug!(conn_id = %conn.id(), error = %e, "status frame not delivered");
            }
            let _ = conn.close().await;
            Ok(false)
        }
    }
}

async fn next_inbound(conn: &WebSocketConnection, idle_deadline: Option<Instant>) -> Inbound {
    let received = match idle_deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, conn.recv()).await {
            Ok(received) => received,
            Err(_) => return Inbound::Idle,
        },
        None => conn.recv().await,
    };
    match received {
        Ok(Some(data)) => Inbound::Frame(data),
        Ok(None) => Inbound::Closed,
        Err(e) => Inbound::Failed(e),
    }
}
