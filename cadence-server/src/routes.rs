use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the application router
pub fn build_router(state: AppState, cors: bool) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health))
        .route("/search", get(handlers::search))
        .route("/direct", get(handlers::direct))
        .route("/stream", get(handlers::stream))
        .route("/download", get(handlers::download))
        .layer(TraceLayer::new_for_http());

    let router = if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(state)
}
