use axum::{Router, extract::DefaultBodyLimit, middleware, routing::get};
use tower_http::trace::TraceLayer;

use super::convert;
use super::health;
use super::middleware::{logging_middleware, metrics_middleware, security_headers_middleware};
use super::state::AppState;

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the application router
///
/// Request bodies are capped slightly above `max_file_size` so oversized
/// uploads fail while streaming instead of being buffered whole.
pub fn create_router(state: AppState, max_file_size: usize) -> Router {
    let convert_routes = convert::create_convert_router().layer(DefaultBodyLimit::max(
        max_file_size.saturating_add(MULTIPART_OVERHEAD_BYTES),
    ));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .nest("/api", convert_routes)
        .with_state(state)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
