// Routes module - organizes all HTTP endpoints
// Each sub-module handles a specific area and exposes a `router()`

pub mod admin;
pub mod auth;
pub mod items;
pub mod notifications;
pub mod points;
pub mod swaps;

use axum::{routing::get, Router};
use std::path::Path;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::app_state::SharedState;
use crate::handlers::health_check;

/// Assemble the full `/api` surface plus static uploads
pub fn build_router(state: SharedState, uploads_dir: &Path) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth::router())
        .nest("/items", items::router())
        .nest("/swaps", swaps::router())
        .nest("/points", points::router())
        .nest("/notifications", notifications::router())
        .nest("/admin", admin::router());

    Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}
