//! # wsgate
//!
//! Real-time push gateway. Clients hold long-lived WebSocket connections,
//! authenticate once, and subscribe to named apps. Backend services push
//! a message to `(app, member)` over HTTP and the gateway delivers it to
//! every live connection of that member subscribed to that app.
//!
//! ```text
//!  backend ── POST /push ──→ PushIngress ──→ SessionRegistry ──→ DeliveryDispatcher
//!                                              ↑                      │ outbox
//!  client ←── WebSocket ──→ handler ── Multiplexer ── AuthGate        ▼
//!                              ↑─────────────────────────────── connection task
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wsgate::prelude::*;
//!
//! struct AllowAll;
//!
//! impl Authenticator for AllowAll {
//!     async fn validate(&self, _member_id: MemberId, _token: &str) -> bool {
//!         true
//!     }
//! }
//!
//! # async fn start() -> Result<(), GatewayError> {
//! let gateway = GatewayBuilder::new()
//!     .config(GatewayConfig::from_env())
//!     .build(AllowAll)
//!     .await?;
//! gateway.run().await
//! # }
//! ```

#![allow(async_fn_in_trait)]

mod config;
mod dispatch;
mod error;
mod handler;
mod http;
mod multiplexer;
mod push;
mod server;

pub use config::GatewayConfig;
pub use dispatch::{DeliveryDispatcher, DeliveryReport};
pub use error::{DeliveryError, GatewayError, PushError};
pub use http::{ApiError, push_routes, router, stats_routes};
pub use push::{DeliveryOutcome, PushIngress, PushRequest};
pub use server::{Gateway, GatewayBuilder};

/// Installs a `tracing` subscriber that honours `RUST_LOG`, defaulting to
/// `info`. Calling it more than once is harmless.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Everything needed to run a gateway and talk to it.
pub mod prelude {
    pub use crate::{
        DeliveryOutcome, Gateway, GatewayBuilder, GatewayConfig, GatewayError, PushError,
        PushIngress, PushRequest,
    };
    pub use wsgate_protocol::{
        AppName, Codec, HandshakeFrame, JsonCodec, MemberId, StatusFrame, SubscribeFrame,
        unwrap_text,
    };
    pub use wsgate_session::{AuthError, Authenticator, RegistryStats, SessionRegistry};
    pub use wsgate_transport::ConnectionId;
}
