//! Session management for wsgate.
//!
//! This crate decides who a connection belongs to and keeps track of it:
//!
//! 1. **Authentication**: the [`Authenticator`] trait (the external
//!    credential store) behind the [`AuthGate`] admission policy
//! 2. **Routing state**: the [`SessionRegistry`], mapping members and
//!    apps to live connections
//! 3. **Lifecycle**: [`ConnectionState`], the per-connection state machine
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway (above)  ← connection tasks and the push path share the registry
//!     ↕
//! Session Layer (this crate)  ← identity, subscriptions, outbound handles
//!     ↕
//! Protocol / Transport (below)  ← MemberId, AppName, ConnectionId
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod registry;
mod session;

pub use auth::{AuthGate, Authenticator};
pub use error::{AuthError, RegistryError, SessionError};
pub use registry::{Outbound, Outbox, RegistryStats, SessionRegistry};
pub use session::ConnectionState;
