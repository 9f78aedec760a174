pub mod health;
pub mod inference;

use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(inference::routes())
}

/// Full application: routes, upload limit and CORS, bound to `state`.
pub fn app(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_bytes;
    build_routes()
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
