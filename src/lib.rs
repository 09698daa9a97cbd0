pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod iban;
pub mod notifications;
pub mod repository;
pub mod service;
pub mod web;

use axum::Router;
use tower::Layer;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    normalize_path::{NormalizePath, NormalizePathLayer},
    trace::TraceLayer,
};

use api::state::AppState;

/// The full application: JSON API under `/api`, health check, and the
/// server-rendered pages.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(api::handlers::root::health_check))
        .nest("/api", api::create_api_routes(state.clone()))
        .merge(web::create_web_routes(state.clone()))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// `build_router` behind trailing-slash normalization, so `/api/token/`
/// and `/api/token` reach the same handler. The layer has to wrap the
/// router from outside because routing happens before any inner layer runs.
pub fn app(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(build_router(state))
}
