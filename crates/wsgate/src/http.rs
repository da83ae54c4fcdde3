//! HTTP ingress: `POST /push` for backend services, `GET /stats` for
//! operators.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use wsgate_session::RegistryStats;

use crate::PushError;
use crate::push::{DeliveryOutcome, PushIngress};

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
struct ApiErrorDetail {
    code: String,
    message: String,
}

/// Error returned to HTTP callers as `{"error":{"code","message"}}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PushError> for ApiError {
    fn from(err: PushError) -> Self {
        match err {
            PushError::BadRequest(message) => Self::bad_request(message),
        }
    }
}

/// Builds the full HTTP API (`/push` and `/stats`) over a shared
/// [`PushIngress`].
pub fn router(ingress: Arc<PushIngress>) -> Router {
    push_routes(Arc::clone(&ingress))
        .merge(stats_routes(ingress))
        .layer(TraceLayer::new_for_http())
}

/// `POST /push` alone. The gateway mounts this next to the WebSocket
/// upgrade on the client-facing listener.
pub fn push_routes(ingress: Arc<PushIngress>) -> Router {
    Router::new().route("/push", post(push)).with_state(ingress)
}

/// `GET /stats` alone, for the loopback-only stats listener.
pub fn stats_routes(ingress: Arc<PushIngress>) -> Router {
    Router::new().route("/stats", get(stats)).with_state(ingress)
}

/// `POST /push`: body is a JSON object with `app`, `member_id` and any
/// payload fields. Answers 202 once delivery has been attempted.
async fn push(
    State(ingress): State<Arc<PushIngress>>,
    body: Bytes,
) -> Result<(StatusCode, Json<DeliveryOutcome>), ApiError> {
    let outcome = ingress.push_json(&body)?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

async fn stats(State(ingress): State<Arc<PushIngress>>) -> Json<RegistryStats> {
    Json(ingress.registry().stats())
}
