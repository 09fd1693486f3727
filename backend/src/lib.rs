//! Presence Backend Library
//!
//! Peer registry, the HTTP discovery endpoint in front of it, and the client
//! each participant uses to talk to that endpoint.

pub mod api;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod registry;

use axum::http::{header, HeaderValue, Method};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;
use crate::api::AppState;

/// Create the application router with the given state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Discovery protocol
        .route("/peers", get(api::peers::list))
        .route("/register", post(api::peers::register))
        .route("/heartbeat", post(api::peers::heartbeat))
        // Metrics (Prometheus)
        .route("/metrics", get(api::metrics::metrics_handler))
        // OpenAPI / Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// Origins of the desktop front-end during development
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:1420,tauri://localhost";

/// Create CORS layer; origins come from `CORS_ALLOWED_ORIGINS` (comma separated)
fn cors_layer() -> CorsLayer {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string());

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}
