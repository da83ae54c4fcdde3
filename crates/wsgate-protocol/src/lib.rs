//! Wire protocol for wsgate.
//!
//! This crate defines what clients and the gateway say to each other:
//!
//! - **Types** ([`HandshakeFrame`], [`SubscribeFrame`], [`StatusFrame`],
//!   [`PushHeader`], and the [`MemberId`] / [`AppName`] identities).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about sockets or routing. Pushed
//! payloads never pass through it on the way out; the gateway forwards the
//! bytes it was given.
//!
//! ```text
//! Transport (bytes) → Protocol (frames) → Session (member, apps)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::{JsonCodec, unwrap_text};
pub use error::ProtocolError;
pub use types::{AppName, HandshakeFrame, MemberId, PushHeader, StatusFrame, SubscribeFrame};
