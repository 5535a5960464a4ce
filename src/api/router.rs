use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::types::AppState;

/// Build the router with every resource mounted. CORS is layered on by the caller.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(handlers::core::router())
        .merge(handlers::users::router())
        .merge(handlers::dashboard::router())
        .merge(handlers::classes::router())
        .merge(handlers::ai::router())
        .merge(handlers::budget::router())
        .merge(handlers::questions::router())
        .merge(handlers::planner::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = origin.parse()?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60)))
}
