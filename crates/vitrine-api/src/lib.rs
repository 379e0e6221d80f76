//! # vitrine-api
//!
//! HTTP transport for the migration engine: single conversion, scope listing
//! and the stateless discover/process batch protocol.

pub mod handlers;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::error;
use uuid::Uuid;

use vitrine_core::{defaults, Error};
use vitrine_engine::MigrationEngine;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MigrationEngine>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(engine: MigrationEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            max_body_bytes: defaults::MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

// =============================================================================
// ROUTER
// =============================================================================

pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/v1/galleries/convert",
            post(handlers::migration::convert_gallery),
        )
        .route(
            "/api/v1/migration/scopes",
            get(handlers::migration::list_scopes),
        )
        .route(
            "/api/v1/migration/discover",
            post(handlers::migration::discover_documents),
        )
        .route(
            "/api/v1/migration/documents/:id",
            post(handlers::migration::process_document),
        )
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(CatchPanicLayer::new())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    Internal(Error),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Rejected {
        message: String,
        edit_url: Option<String>,
    },
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::Rejected { message, edit_url } => ApiError::Rejected { message, edit_url },
            err if err.is_not_found() => ApiError::NotFound(err.to_string()),
            err => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ApiError::Internal(err) => {
                error!(subsystem = "api", error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": err.to_string() }),
                )
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, serde_json::json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg }))
            }
            ApiError::Rejected { message, edit_url } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                serde_json::json!({ "error": message, "edit_url": edit_url }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
