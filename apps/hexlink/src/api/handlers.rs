//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers. Engine calls
//! are synchronous and may run whole pipelines, so every one of them is
//! moved onto tokio's blocking pool.

use super::{
    AppState,
    types::{
        DeleteResponse, HealthResponse, IngestResponse, QueryRequest, ResultsResponse,
        StatusResponse, TraverseRequest, TraverseStart,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use hexlink_core::{HexStore, HexlinkError};
use serde_json::Value;
use std::sync::Arc;

// =============================================================================
// HELPERS
// =============================================================================

/// Run `f` against the store on the blocking pool.
async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, HexlinkError>
where
    F: FnOnce(&HexStore) -> Result<T, HexlinkError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| HexlinkError::PipelineFailed(format!("blocking task failed: {}", e)))?
}

/// HTTP status for an engine error.
pub fn status_for(err: &HexlinkError) -> StatusCode {
    match err.root() {
        HexlinkError::NotFound(_) => StatusCode::NOT_FOUND,
        HexlinkError::MalformedInput(_)
        | HexlinkError::ClassificationError(_)
        | HexlinkError::InvalidTraversal(_)
        | HexlinkError::SerializationError(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn results_reply(
    result: Result<hexlink_core::ResultSet, HexlinkError>,
) -> (StatusCode, Json<ResultsResponse>) {
    match result {
        Ok(results) => (StatusCode::OK, Json(ResultsResponse::success(results))),
        Err(e) => (status_for(&e), Json(ResultsResponse::error(e.to_string()))),
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Triple, link and filter counts.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    match run_blocking(&state, HexStore::stats).await {
        Ok(stats) => (StatusCode::OK, Json(StatusResponse::from(stats))).into_response(),
        Err(e) => (
            status_for(&e),
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

// =============================================================================
// INGEST HANDLER
// =============================================================================

/// Ingest one object or an array of objects.
pub async fn ingest_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    match run_blocking(&state, move |store| store.ingest_values(vec![body])).await {
        Ok(count) => (StatusCode::OK, Json(IngestResponse::success(count))),
        Err(e) => (
            status_for(&e),
            Json(IngestResponse::error(format!("Ingest failed: {}", e))),
        ),
    }
}

// =============================================================================
// OBJECT HANDLERS
// =============================================================================

/// Fetch one object by id.
pub async fn get_object_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let result = run_blocking(&state, move |store| {
        store.find_by_id(&id, &hexlink_core::FilterSpec::new())
    })
    .await;
    results_reply(result)
}

/// Remove one object, its links and any anchors it orphans.
pub async fn delete_object_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let target = id.clone();
    match run_blocking(&state, move |store| store.delete(&target)).await {
        Ok(()) => (StatusCode::OK, Json(DeleteResponse::success(id))),
        Err(e) => (status_for(&e), Json(DeleteResponse::error(id, e.to_string()))),
    }
}

// =============================================================================
// QUERY HANDLER
// =============================================================================

/// Execute a type, value or predicate query.
pub async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> impl IntoResponse {
    let result = run_blocking(&state, move |store| match request {
        QueryRequest::ByType {
            object_type,
            filter,
        } => store.find_by_type(&object_type, &filter),
        QueryRequest::ByValue { term, filter } => store.find_by_value(&term, &filter),
        QueryRequest::ByPredicate { path, filter } => store.find_by_predicate(&path, &filter),
    })
    .await;
    results_reply(result)
}

// =============================================================================
// TRAVERSE HANDLER
// =============================================================================

/// Walk the link graph from an id or from every holder of a value.
pub async fn traverse_handler(
    State(state): State<AppState>,
    Json(request): Json<TraverseRequest>,
) -> impl IntoResponse {
    let start = match request.start() {
        Ok(start) => start,
        Err(e) => return results_reply(Err(e)),
    };
    let result = run_blocking(&state, move |store| match start {
        TraverseStart::Id(id) => {
            store.traversal_with_id(&id, &request.traversal, &request.filter)
        }
        TraverseStart::Value(value) => {
            store.traversal_with_value(&value, &request.traversal, &request.filter)
        }
    })
    .await;
    results_reply(result)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_root_error() {
        let wrapped = HexlinkError::NotFound("x".to_string()).in_stage("classify");
        assert_eq!(status_for(&wrapped), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&HexlinkError::InvalidTraversal(String::new())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&HexlinkError::StorageError(String::new())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
