//! # Hexlink HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Triple, link and filter counts
//! - `POST /ingest` - Ingest an object or an array of objects
//! - `GET /objects/{id}` - Fetch an object
//! - `DELETE /objects/{id}` - Remove an object
//! - `POST /query` - Type, value or predicate query
//! - `POST /traverse` - Multi-hop traversal
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `HEXLINK_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `HEXLINK_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod types;

pub use auth::{API_KEY_ENV, get_api_key_from_env, keys_match};
pub use handlers::status_for;
pub use types::{
    DeleteResponse, HealthResponse, IngestResponse, QueryRequest, ResultsResponse,
    StatusResponse, TraverseRequest, TraverseStart,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use hexlink_core::{HexStore, HexlinkError};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state. The store synchronises internally, so handlers
/// share it without a lock.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<HexStore>,
}

impl AppState {
    #[must_use]
    pub fn new(store: HexStore) -> Self {
        Self::shared(Arc::new(store))
    }

    #[must_use]
    pub fn shared(store: Arc<HexStore>) -> Self {
        Self { store }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from `HEXLINK_CORS_ORIGINS`.
///
/// - `*` allows all origins
/// - unset (or no valid entries) allows localhost only
/// - otherwise a comma-separated list of origins
fn build_cors_layer() -> CorsLayer {
    match std::env::var("HEXLINK_CORS_ORIGINS").ok().as_deref() {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins (HEXLINK_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in HEXLINK_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                cors_for(allowed_origins)
            }
        }
        None => build_localhost_cors(),
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();
    cors_for(origins)
}

fn cors_for(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Authentication - validates API key (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible. \
             Set {} to enable authentication.",
            API_KEY_ENV
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/ingest", post(handlers::ingest_handler))
        .route(
            "/objects/{id}",
            get(handlers::get_object_handler).delete(handlers::delete_object_handler),
        )
        .route("/query", post(handlers::query_handler))
        .route("/traverse", post(handlers::traverse_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

/// Serve the API on `addr` until Ctrl-C, then persist the link filter.
pub async fn run_server(addr: &str, store: HexStore) -> Result<(), HexlinkError> {
    let store = Arc::new(store);
    let router = create_router(AppState::shared(Arc::clone(&store)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| HexlinkError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Hexlink HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| HexlinkError::IoError(format!("Server error: {}", e)))?;

    // In-flight blocking tasks may still hold a handle; flush through it.
    match Arc::try_unwrap(store) {
        Ok(store) => store.close(),
        Err(shared) => shared.flush(),
    }
}
