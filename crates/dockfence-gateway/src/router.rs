//! Axum router wiring.

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CorsSection;
use crate::{app_state::AppState, ops, transport::http};

/// Origins were checked at config load; anything unparsable is skipped.
fn cors_layer(cors: &CorsSection) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if cors.allows_any() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(origins)
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cfg().cors);

    Router::new()
        .route("/", get(ops::root))
        .route("/health", get(ops::health))
        .route("/metrics", get(ops::metrics))
        .route("/containers", get(http::list_containers))
        .route("/containers/create", post(http::create_container))
        .route(
            "/containers/:id",
            get(http::inspect_container).delete(http::remove_container),
        )
        .route("/containers/:id/start", post(http::start_container))
        .route("/containers/:id/stop", post(http::stop_container))
        .route("/containers/:id/restart", post(http::restart_container))
        .route("/containers/:id/logs", get(http::container_logs))
        .route("/containers/:id/stats", get(http::container_stats))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
