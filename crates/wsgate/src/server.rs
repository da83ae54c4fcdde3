//! `Gateway` builder and server loop.
//!
//! The gateway runs two listeners side by side. The client-facing one
//! upgrades `GET /` to a WebSocket and takes backend pushes on
//! `POST /push`. The stats listener answers `GET /stats` and is meant to
//! stay on loopback. Both share one [`SessionRegistry`].

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use wsgate_protocol::{Codec, JsonCodec};
use wsgate_session::{AuthGate, Authenticator, SessionRegistry};

use crate::handler::upgrade;
use crate::http::{push_routes, stats_routes};
use crate::push::PushIngress;
use crate::{GatewayConfig, GatewayError};

/// Shared state passed to each connection handler task.
pub(crate) struct GatewayState<A: Authenticator, C: Codec> {
    pub(crate) gate: AuthGate<A>,
    pub(crate) codec: C,
    pub(crate) config: GatewayConfig,
}

/// Builder for configuring and starting a gateway.
///
/// # Example
///
/// ```rust,ignore
/// use wsgate::prelude::*;
///
/// let gateway = GatewayBuilder::new()
///     .ws_bind("0.0.0.0:5000")
///     .stats_bind("127.0.0.1:6000")
///     .build(my_auth)
///     .await?;
/// gateway.run().await
/// ```
pub struct GatewayBuilder {
    config: GatewayConfig,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn ws_bind(mut self, addr: &str) -> Self {
        self.config.ws_addr = addr.to_string();
        self
    }

    pub fn stats_bind(mut self, addr: &str) -> Self {
        self.config.stats_addr = addr.to_string();
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn acks(mut self, enabled: bool) -> Self {
        self.config.acks = enabled;
        self
    }

    /// Per-connection queue length. Clamped to at least 1.
    pub fn outbox_capacity(mut self, capacity: usize) -> Self {
        self.config.outbox_capacity = capacity.max(1);
        self
    }

    /// Binds both listeners. Uses `JsonCodec` for client frames.
    ///
    /// # Errors
    /// [`GatewayError::Bind`] if either address cannot be bound.
    pub async fn build<A: Authenticator>(
        self,
        authenticator: A,
    ) -> Result<Gateway<A, JsonCodec>, GatewayError> {
        let ws = bind(&self.config.ws_addr).await?;
        let stats = bind(&self.config.stats_addr).await?;

        let registry = Arc::new(SessionRegistry::new());
        let ingress = Arc::new(PushIngress::new(Arc::clone(&registry)));
        let state = Arc::new(GatewayState {
            gate: AuthGate::new(authenticator, registry),
            codec: JsonCodec,
            config: self.config,
        });

        Ok(Gateway {
            ws,
            stats,
            state,
            ingress,
        })
    }
}

async fn bind(addr: &str) -> Result<TcpListener, GatewayError> {
    TcpListener::bind(addr).await.map_err(|source| GatewayError::Bind {
        addr: addr.to_string(),
        source,
    })
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound gateway. Call [`run()`](Self::run) to start serving.
pub struct Gateway<A: Authenticator, C: Codec> {
    ws: TcpListener,
    stats: TcpListener,
    state: Arc<GatewayState<A, C>>,
    ingress: Arc<PushIngress>,
}

impl<A, C> Gateway<A, C>
where
    A: Authenticator,
    C: Codec + 'static,
{
    /// Address of the client-facing listener (WebSocket and `/push`).
    pub fn ws_addr(&self) -> std::io::Result<SocketAddr> {
        self.ws.local_addr()
    }

    /// Address of the stats listener.
    pub fn stats_addr(&self) -> std::io::Result<SocketAddr> {
        self.stats.local_addr()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.state.gate.registry()
    }

    pub fn ingress(&self) -> &Arc<PushIngress> {
        &self.ingress
    }

    /// The full HTTP API (`/push` and `/stats`), sharing this gateway's
    /// registry. Useful for mounting the ingress into a test server or
    /// another listener.
    pub fn router(&self) -> Router {
        crate::router(Arc::clone(&self.ingress))
    }

    /// Serves both listeners until one of them fails.
    ///
    /// Upgrades run inside each connection's own task, so a client that
    /// opens a socket and goes quiet never delays anyone else's handshake.
    pub async fn run(self) -> Result<(), GatewayError> {
        let Self {
            ws,
            stats,
            state,
            ingress,
        } = self;

        tracing::info!(
            ws_addr = ?ws.local_addr().ok(),
            stats_addr = ?stats.local_addr().ok(),
            "gateway running"
        );

        let client_app = Router::new()
            .route("/", get(upgrade::<A, C>))
            .with_state(state)
            .merge(push_routes(Arc::clone(&ingress)))
            .layer(TraceLayer::new_for_http());
        let stats_app = stats_routes(ingress).layer(TraceLayer::new_for_http());

        let client_server = axum::serve(
            ws,
            client_app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .into_future();
        let stats_server = axum::serve(stats, stats_app).into_future();

        tokio::select! {
            result = client_server => result.map_err(GatewayError::Serve),
            result = stats_server => result.map_err(GatewayError::Serve),
        }
    }
}
