pub mod appstate;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::server::appstate::AppState;

/// Assemble the full HTTP service: all routers plus the shared layers.
pub fn build_service(appstate: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(appstate)
}
