use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;

use super::handlers;
use super::static_files::static_handler;
use super::state::AppState;

// UI Routes - web interface
pub fn ui_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::ui::index_handler))
        .route("/static/{*path}", get(static_handler))
}

// API Routes - REST API for programmatic access
pub fn api_routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Question over an uploaded database
            .route(
                "/ask",
                post(handlers::api::ask).layer(DefaultBodyLimit::max(max_upload_bytes)),
            )
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
