//! Standalone push gateway with a stand-in authenticator.
//!
//! Configure with `WSGATE_*` environment variables and `RUST_LOG`. Then:
//!
//! ```text
//! client:  {"member_id":123456,"token":"654321"}   → {"code":200,"message":"hello 123456"}
//! client:  {"app":"im"}                             → {"code":200,"message":"subscribe im success"}
//! backend: curl -d '{"app":"im","member_id":123456,"text":"{\"hello\":123456}"}' \
//!               http://127.0.0.1:5000/push
//! operator: curl http://127.0.0.1:6000/stats
//! ```

use wsgate::prelude::*;

/// Accepts any token, except for member 12345 who is always refused.
struct DemoAuth;

const BANNED_MEMBER: MemberId = MemberId(12345);

impl Authenticator for DemoAuth {
    async fn validate(&self, member_id: MemberId, _token: &str) -> bool {
        member_id != BANNED_MEMBER
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    wsgate::init_tracing();

    let config = GatewayConfig::from_env();
    tracing::info!(ws_addr = %config.ws_addr, stats_addr = %config.stats_addr, "starting push gateway");

    let gateway = GatewayBuilder::new().config(config).build(DemoAuth).await?;
    gateway.run().await?;
    Ok(())
}
