use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{download, handlers, middleware::metrics_middleware, runs};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        .route("/config", get(handlers::get_config))
        .route("/dates", get(handlers::get_dates))
        .route("/runs", get(runs::list_runs))
        .route("/download/{ids}", get(download::download_products))
        .with_state(Arc::clone(&state));

    Router::new()
        .route("/", get(handlers::health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
