use axum::{extract::State, response::IntoResponse};

use crate::api::AppState;

/// Prometheus metrics endpoint
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    // Refresh the gauge so a scrape reflects expiries since the last listing
    let active = state.registry.active_count().await;
    metrics::gauge!("presence_active_peers", active as f64);

    let body = match &state.metrics {
        Some(handle) => handle.render(),
        None => format!(
            "# HELP presence_info Presence backend info\n\
             # TYPE presence_info gauge\n\
             presence_info{{version=\"{}\"}} 1\n\
             # HELP presence_active_peers Peers seen within the liveness timeout\n\
             # TYPE presence_active_peers gauge\n\
             presence_active_peers {}\n",
            env!("CARGO_PKG_VERSION"),
            active
        ),
    };

    ([("content-type", "text/plain; charset=utf-8")], body)
}
