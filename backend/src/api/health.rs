use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_peers: usize,
}

/// Service liveness and a count of active peers
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_peers: state.registry.active_count().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_health_check() {
        let state = AppState::new(Config::default());
        state.registry.register("p1", "127.0.0.1", 4001).await.unwrap();

        let response = health_check(State(state)).await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.active_peers, 1);
    }
}
