use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::metrics::stream;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── User endpoints ──────────────────────────────────────
        .route(
            "/api/users",
            post(handlers::users::create_user).get(handlers::users::list_users),
        )
        .route(
            "/api/users/optimized",
            post(handlers::users::create_user_optimized),
        )
        .route("/api/users/fast", post(handlers::users::create_user_fast))
        // ── Metrics ─────────────────────────────────────────────
        .route("/api/metrics", get(stream::get_metrics))
        .route("/api/metrics/reset", post(stream::reset_metrics))
        .route("/api/metrics/stream", get(stream::metrics_stream))
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            timing::timing_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
