//! HTTP routes for store-api

pub mod buy;
pub mod health;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{any, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", any(health::health_check))
        .route("/buy", post(buy::buy).fallback(buy::method_not_allowed))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
