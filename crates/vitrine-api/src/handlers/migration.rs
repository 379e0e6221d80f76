//! Gallery conversion and batch migration handlers.
//!
//! The batch protocol is driven by the client: `discover` once, then one
//! `process` call per returned document id.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{ApiError, AppState};
use vitrine_core::{ConvertRequest, ImportResult, ProcessOutcome, ScopeOption};

/// Request body for discovery.
#[derive(Debug, Default, Deserialize)]
pub struct DiscoverRequest {
    /// Document scope to search; all scopes when absent or blank.
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub document_ids: Vec<i64>,
    pub total: usize,
}

/// Convert an explicit media list into one gallery.
///
/// # Returns
/// - 200 OK with the import result (including total failure, `failed: true`)
/// - 400 Bad Request when no media is given
/// - 403 Forbidden when the target document may not be edited
/// - 404 Not Found when the target document does not exist
pub async fn convert_gallery(
    State(state): State<AppState>,
    Json(req): Json<ConvertRequest>,
) -> Result<Json<ImportResult>, ApiError> {
    let result = state.engine.convert_single(req).await?;
    Ok(Json(result))
}

/// Scopes offered for batch migration.
pub async fn list_scopes(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScopeOption>>, ApiError> {
    Ok(Json(state.engine.list_eligible_scopes().await?))
}

/// Documents that still hold legacy galleries.
///
/// # Returns
/// - 200 OK with `{ "document_ids": [...], "total": n }`
/// - 404 Not Found when nothing is left to convert
pub async fn discover_documents(
    State(state): State<AppState>,
    body: Option<Json<DiscoverRequest>>,
) -> Result<Json<DiscoverResponse>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let scope = request
        .scope
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let document_ids = state.engine.discover(scope).await?;
    Ok(Json(DiscoverResponse {
        total: document_ids.len(),
        document_ids,
    }))
}

/// Convert one document.
///
/// # Returns
/// - 200 OK with the outcome (`rewritten: false` for ineligible documents)
/// - 403 Forbidden / 404 Not Found
/// - 422 Unprocessable Entity with `edit_url` when the document is rejected
pub async fn process_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProcessOutcome>, ApiError> {
    Ok(Json(state.engine.process_one(id).await?))
}
