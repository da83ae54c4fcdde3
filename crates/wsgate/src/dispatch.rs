//! Delivery dispatcher: writes a payload to resolved connections.
//!
//! Delivery is best-effort and happens at push time. A payload is handed
//! to each recipient's connection task through its bounded outbox. Nothing
//! is queued for connections that are not there, nothing is retried, and a
//! client that stops reading loses messages instead of growing memory.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use wsgate_session::{Outbound, SessionRegistry};
use wsgate_transport::ConnectionId;

use crate::DeliveryError;

/// Result of delivering one payload to a set of connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Resolves connection ids to outboxes and writes to them.
#[derive(Clone)]
pub struct DeliveryDispatcher {
    registry: Arc<SessionRegistry>,
}

impl DeliveryDispatcher {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Writes `payload` to one connection.
    ///
    /// Never waits: a full outbox fails this delivery immediately.
    ///
    /// # Errors
    /// - [`DeliveryError::ConnectionGone`] if the connection was
    ///   deregistered or its task has exited. In the latter case the stale
    ///   entry is removed so later pushes skip it.
    /// - [`DeliveryError::Backpressure`] if the outbox is full. The
    ///   connection stays registered.
    pub fn deliver(&self, conn_id: ConnectionId, payload: &Outbound) -> Result<(), DeliveryError> {
        let outbox = self
            .registry
            .outbox(conn_id)
            .ok_or(DeliveryError::ConnectionGone(conn_id))?;

        match outbox.try_send(Arc::clone(payload)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DeliveryError::Backpressure(conn_id)),
            Err(TrySendError::Closed(_)) => {
                self.registry.deregister(conn_id);
                Err(DeliveryError::ConnectionGone(conn_id))
            }
        }
    }

    /// Writes `payload` to every connection in `targets`.
    ///
    /// A failed recipient is logged and skipped; it never stops delivery
    /// to the others.
    pub fn deliver_all(
        &self,
        targets: impl IntoIterator<Item = ConnectionId>,
        payload: &Outbound,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for conn_id in targets {
            match self.deliver(conn_id, payload) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(%conn_id, error = %e, "delivery skipped");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
