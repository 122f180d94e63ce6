//! Router configuration for the web server.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Headroom above the upload ceiling so oversize images get a policy error, not a dropped body.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.policy.max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_LIMIT_SLACK);

    Router::new()
        .route("/", get(handlers::index))
        // Selected image: replace with PUT, preview with GET
        .route(
            "/api/image",
            get(handlers::preview_image).put(handlers::upload_image),
        )
        .route("/api/recognize", post(handlers::recognize))
        .route("/api/status", get(handlers::status))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
