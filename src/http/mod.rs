//! HTTP surface over the engine: routing, caller identification, error
//! mapping and request metrics.

pub mod dto;
mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{FromRequestParts, MatchedPath, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use ulid::Ulid;

use crate::auth::IdentityProvider;
use crate::engine::{Caller, Engine, EngineError, ErrorKind};
use crate::observability;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub identity: Arc<dyn IdentityProvider>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/users", post(handlers::register_user).get(handlers::list_users))
        .route("/api/users/me", get(handlers::current_user))
        .route("/api/users/{id}", get(handlers::get_user))
        .route("/api/users/{id}/role", put(handlers::change_role))
        .route("/api/courts", get(handlers::list_courts).post(handlers::create_court))
        .route("/api/courts/available", get(handlers::list_available_courts))
        .route(
            "/api/courts/{id}",
            get(handlers::get_court)
                .put(handlers::update_court)
                .patch(handlers::patch_court)
                .delete(handlers::delete_court),
        )
        .route("/api/courts/{id}/free-slots", get(handlers::free_slots))
        .route("/api/courts/{id}/conflict", get(handlers::has_conflict))
        .route("/api/bookings", get(handlers::list_bookings).post(handlers::create_booking))
        .route("/api/bookings/me", get(handlers::list_my_bookings))
        .route(
            "/api/bookings/{id}",
            get(handlers::get_booking)
                .put(handlers::update_booking)
                .patch(handlers::patch_booking)
                .delete(handlers::delete_booking),
        )
        .route("/api/bookings/{id}/cancel", post(handlers::cancel_booking))
        .route("/api/statistics/admin", get(handlers::admin_stats))
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_default();
    let operation = observability::operation_label(req.method().as_str(), &route);

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    tracing::debug!("{operation} -> {status}");
    metrics::counter!(observability::REQUESTS_TOTAL, "operation" => operation, "status" => status)
        .increment(1);
    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "operation" => operation)
        .record(started.elapsed().as_secs_f64());
    response
}

// ── Errors ───────────────────────────────────────────────

/// Engine error rendered as `{"error": kind, "message": text}`.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        if kind == ErrorKind::Internal {
            tracing::error!("request failed: {}", self.0);
        }
        let body = serde_json::json!({
            "error": kind.as_str(),
            "message": self.0.to_string(),
        });
        (status_for(kind), Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Parse a JSON body; malformed JSON, wrong types and unknown keys all
/// surface as validation errors.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError(EngineError::Validation(format!("invalid request body: {e}"))))
}

pub(crate) fn parse_id(raw: &str, entity: &'static str) -> ApiResult<Ulid> {
    raw.parse()
        .map_err(|_| ApiError(EngineError::Validation(format!("invalid {entity} id: {raw:?}"))))
}

// ── Caller extraction ────────────────────────────────────

/// The identified caller of a request.
pub struct Authenticated(pub Caller);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match state.identity.identify(&parts.headers).await {
            Ok(caller) => Ok(Authenticated(caller)),
            Err(e) => {
                metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
                tracing::debug!("rejected request: {e}");
                Err(ApiError(e))
            }
        }
    }
}
