//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the whiteboard procedures and the health check under a
//! single Axum router with permissive CORS (the editor may be served from a
//! different origin) and request tracing.

pub mod whiteboard;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/whiteboard", post(whiteboard::create))
        .route("/api/whiteboard/{id}", get(whiteboard::get_by_id).put(whiteboard::update))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
