use axum::response::IntoResponse;

use crate::web::static_files::serve_static_file;

// Main UI entry point
pub async fn index_handler() -> impl IntoResponse {
    serve_static_file("index.html")
}
