//! Gateway configuration.

use std::time::Duration;

/// Runtime settings for a [`Gateway`](crate::Gateway).
///
/// Start from `GatewayConfig::default()` and override what you need, or
/// load everything from the environment with [`from_env`](Self::from_env).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address clients connect to. Serves the WebSocket upgrade on `/`
    /// and the push ingress on `POST /push`.
    pub ws_addr: String,
    /// Address the stats endpoint binds to. Keep it off public interfaces.
    pub stats_addr: String,
    /// How long a new connection has to send its handshake frame.
    pub handshake_timeout: Duration,
    /// Close authenticated connections that stay silent this long.
    /// `None` leaves idle connections open indefinitely.
    pub idle_timeout: Option<Duration>,
    /// Answer successful handshakes and subscriptions with a status frame.
    /// Error frames are always sent before a connection is closed.
    pub acks: bool,
    /// Messages queued per connection before further pushes to it are
    /// dropped and reported as failed.
    pub outbox_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ws_addr: "0.0.0.0:5000".to_string(),
            stats_addr: "127.0.0.1:6000".to_string(),
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: None,
            acks: true,
            outbox_capacity: 64,
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `WSGATE_WS_ADDR` | WebSocket and push bind address |
    /// | `WSGATE_STATS_ADDR` | stats bind address |
    /// | `WSGATE_HANDSHAKE_TIMEOUT_SECS` | handshake timeout |
    /// | `WSGATE_IDLE_TIMEOUT_SECS` | idle timeout (`0` disables) |
    /// | `WSGATE_ACKS` | `true` / `false` |
    /// | `WSGATE_OUTBOX_CAPACITY` | per-connection queue length (`0` ignored) |
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            ws_addr: lookup("WSGATE_WS_ADDR")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.ws_addr),
            stats_addr: lookup("WSGATE_STATS_ADDR")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.stats_addr),
            handshake_timeout: parsed(&lookup, "WSGATE_HANDSHAKE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.handshake_timeout),
            idle_timeout: match parsed::<u64>(&lookup, "WSGATE_IDLE_TIMEOUT_SECS") {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.idle_timeout,
            },
            acks: parsed(&lookup, "WSGATE_ACKS").unwrap_or(defaults.acks),
            outbox_capacity: parsed::<usize>(&lookup, "WSGATE_OUTBOX_CAPACITY")
                .filter(|&n| n > 0)
                .unwrap_or(defaults.outbox_capacity),
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(name, value = %raw, "ignoring unparsable config value");
            None
        }
    }
}
