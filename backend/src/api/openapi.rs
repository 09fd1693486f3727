//! OpenAPI documentation for the discovery API

use utoipa::OpenApi;

/// API Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Presence API",
        version = "1.0.0",
        description = "Peer presence and discovery.\n\n## Protocol\n- `POST /register` once at startup\n- `POST /heartbeat?peer_id=...` on an interval shorter than the liveness timeout\n- `GET /peers` to find connection targets\n\nA heartbeat answered with 404 means the peer expired and must register again.",
        license(name = "MIT"),
        contact(name = "Presence Team")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    tags(
        (name = "peers", description = "Registration, heartbeats and peer listing"),
        (name = "health", description = "Service health")
    ),
    paths(
        crate::api::peers::list,
        crate::api::peers::register,
        crate::api::peers::heartbeat,
        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::models::Peer,
            crate::models::RegisterRequest,
            crate::models::RegisterResponse,
            crate::models::HeartbeatResponse,
            crate::models::Message,
            crate::api::health::HealthResponse,
            crate::api::response::ApiResponse,
            crate::api::response::ApiError,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_protocol_paths() {
        let doc = ApiDoc::openapi();
        for path in ["/peers", "/register", "/heartbeat", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
