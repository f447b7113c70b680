//! API layer - HTTP handlers and routing
//!
//! Everything lives under `/api/v1`:
//! - Company accounts (register, login, logout, me)
//! - Company profile setup and updates
//! - Company photos
//! - Proximity search
//!
//! Stored photos are served read-only under `/photos`.

pub mod accounts;
pub mod common;
pub mod companies;
pub mod middleware;
pub mod photos;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedCompany, ErrorHandler};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a valid session)
    let protected_routes = Router::new()
        .merge(accounts::protected_router())
        .merge(companies::protected_router())
        .merge(photos::router(state.upload_config.max_file_size))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    let company_routes = Router::new()
        .merge(accounts::public_router())
        .merge(companies::public_router())
        .merge(protected_routes);

    Router::new()
        .nest("/companies", company_routes)
        .route("/health", get(health))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    // Cookie auth needs credentials, which rules out a wildcard origin
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let photo_dir = state.upload_config.path.clone();

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .nest_service("/photos", ServeDir::new(photo_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state))
}

/// GET /api/v1/health
async fn health() -> &'static str {
    "ok"
}
