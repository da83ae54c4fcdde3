//! Push ingress: validates a routed message and fans it out.
//!
//! Push is fire-and-forget and at-most-once. A member with no live
//! connection subscribed to the target app simply doesn't get the
//! message; that is reported as [`DeliveryOutcome::NoRecipient`], not as
//! an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use wsgate_protocol::{AppName, MemberId, PushHeader};
use wsgate_session::{Outbound, SessionRegistry};

use crate::PushError;
use crate::dispatch::DeliveryDispatcher;

/// A validated delivery instruction.
///
/// `payload` is what recipients receive, byte for byte. For HTTP pushes it
/// is the whole request body, so an optional `"text"` wrapper reaches the
/// client exactly as the caller sent it.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub app: AppName,
    pub member_id: MemberId,
    pub payload: Outbound,
}

impl PushRequest {
    /// Validates routing fields and builds a request.
    ///
    /// # Errors
    /// [`PushError::BadRequest`] if `app` is empty or `member_id` is absent.
    pub fn new(
        app: &str,
        member_id: Option<i64>,
        payload: impl Into<Outbound>,
    ) -> Result<Self, PushError> {
        let app = AppName::new(app).map_err(|e| PushError::BadRequest(e.to_string()))?;
        let member_id = member_id
            .map(MemberId)
            .ok_or_else(|| PushError::BadRequest("member_id is required".into()))?;
        Ok(Self {
            app,
            member_id,
            payload: payload.into(),
        })
    }

    /// Parses a JSON push body: an object with `app` and `member_id`, plus
    /// any payload fields. The body itself becomes the payload.
    ///
    /// # Errors
    /// [`PushError::BadRequest`] if the body is not a JSON object or its
    /// routing fields are missing or mistyped.
    pub fn from_json(body: &[u8]) -> Result<Self, PushError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| PushError::BadRequest(format!("invalid JSON body: {e}")))?;
        if !value.is_object() {
            return Err(PushError::BadRequest("body must be a JSON object".into()));
        }
        let header = PushHeader::deserialize(&value)
            .map_err(|e| PushError::BadRequest(format!("invalid routing fields: {e}")))?;
        Self::new(&header.app, header.member_id, body)
    }
}

/// What happened to a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// No live connection of the member is subscribed to the app.
    NoRecipient,
    /// At least one recipient was resolved; `failed` counts the ones that
    /// closed before the write or whose outbox was full.
    Delivered { delivered: usize, failed: usize },
}

/// Entry point for backend services that push to members.
pub struct PushIngress {
    registry: Arc<SessionRegistry>,
    dispatcher: DeliveryDispatcher,
}

impl PushIngress {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            dispatcher: DeliveryDispatcher::new(Arc::clone(&registry)),
            registry,
        }
    }

    /// Routes a validated request to every matching live connection.
    pub fn push(&self, request: &PushRequest) -> DeliveryOutcome {
        let targets = self.registry.lookup(request.member_id, &request.app);
        if targets.is_empty() {
            tracing::debug!(app = %request.app, member_id = %request.member_id, "push has no recipient");
            return DeliveryOutcome::NoRecipient;
        }

        let report = self.dispatcher.deliver_all(targets, &request.payload);
        tracing::debug!(
            app = %request.app,
            member_id = %request.member_id,
            delivered = report.delivered,
            failed = report.failed,
            "push delivered"
        );
        DeliveryOutcome::Delivered {
            delivered: report.delivered,
            failed: report.failed,
        }
    }

    /// Parses and routes a JSON push body.
    ///
    /// # Errors
    /// [`PushError::BadRequest`] before the registry is consulted.
    pub fn push_json(&self, body: &[u8]) -> Result<DeliveryOutcome, PushError> {
        let request = PushRequest::from_json(body)?;
        Ok(self.push(&request))
    }

    /// The registry pushes are routed through.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}
