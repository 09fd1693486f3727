use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Query, State},
    Json,
};
use std::net::{IpAddr, SocketAddr};

use crate::api::response::ApiResponse;
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{
    validate_port, HeartbeatParams, HeartbeatResponse, Peer, RegisterRequest, RegisterResponse,
};

/// List peers seen within the liveness timeout
#[utoipa::path(
    get,
    path = "/peers",
    tag = "peers",
    responses(
        (status = 200, description = "Active peers, unordered", body = Vec<Peer>),
    )
)]
pub async fn list(State(state): State<AppState>) -> Json<Vec<Peer>> {
    Json(state.registry.list().await)
}

/// Register (or re-register) the calling peer
///
/// The address the connection arrived from wins over a declared `ip`; the
/// declared one is only used when no connection address is available.
#[utoipa::path(
    post,
    path = "/register",
    tag = "peers",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Peer registered", body = RegisterResponse),
        (status = 400, description = "Invalid id, port or body", body = ApiResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<RegisterResponse>> {
    let Json(req) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let port = validate_port(req.port).map_err(AppError::BadRequest)?;
    let observed = connect_info.map(|ConnectInfo(addr)| addr);
    let ip = resolve_ip(observed, req.ip.as_deref())?;

    if let (Some(declared), Some(addr)) = (req.ip.as_deref(), observed) {
        if declared != ip {
            tracing::debug!(
                "Peer {} declared {} but connected from {}, using observed address",
                req.id,
                declared,
                addr.ip()
            );
        }
    }

    state.registry.register(&req.id, &ip, port).await?;

    Ok(Json(RegisterResponse {
        message: "Peer registered".to_string(),
        ip,
        port,
    }))
}

/// Refresh the liveness of a registered peer
#[utoipa::path(
    post,
    path = "/heartbeat",
    tag = "peers",
    params(HeartbeatParams),
    responses(
        (status = 200, description = "Heartbeat received", body = HeartbeatResponse),
        (status = 400, description = "Missing or invalid peer_id", body = ApiResponse),
        (status = 404, description = "Peer unknown or expired, register again", body = ApiResponse),
    )
)]
pub async fn heartbeat(
    State(state): State<AppState>,
    Query(params): Query<HeartbeatParams>,
) -> AppResult<Json<HeartbeatResponse>> {
    let peer_id = params
        .peer_id
        .ok_or_else(|| AppError::bad_request("Missing query parameter: peer_id"))?;

    let timestamp = state.registry.heartbeat(&peer_id).await?;

    Ok(Json(HeartbeatResponse {
        message: "Heartbeat received".to_string(),
        timestamp,
    }))
}

/// Pick the address recorded for a registering peer.
fn resolve_ip(observed: Option<SocketAddr>, declared: Option<&str>) -> AppResult<String> {
    if let Some(addr) = observed {
        return Ok(canonical_ip(addr.ip()).to_string());
    }

    match declared {
        Some(raw) => raw
            .trim()
            .parse::<IpAddr>()
            .map(|ip| canonical_ip(ip).to_string())
            .map_err(|_| AppError::BadRequest(format!("Invalid ip address: {}", raw))),
        None => Err(AppError::bad_request(
            "Peer address unknown: no connection address and no ip in body",
        )),
    }
}

/// Unwrap IPv4-mapped IPv6 addresses from dual-stack listeners
fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        IpAddr::V4(_) => ip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observed_address_wins() {
        let observed: SocketAddr = "192.168.1.20:51000".parse().unwrap();
        let ip = resolve_ip(Some(observed), Some("10.0.0.5")).unwrap();
        assert_eq!(ip, "192.168.1.20");
    }

    #[test]
    fn test_declared_address_used_without_connection_info() {
        assert_eq!(resolve_ip(None, Some(" 10.0.0.5 ")).unwrap(), "10.0.0.5");
        assert!(resolve_ip(None, Some("not-an-ip")).is_err());
        assert!(resolve_ip(None, None).is_err());
    }

    #[test]
    fn test_ipv4_mapped_addresses_are_unwrapped() {
        let observed: SocketAddr = "[::ffff:127.0.0.1]:4000".parse().unwrap();
        assert_eq!(resolve_ip(Some(observed), None).unwrap(), "127.0.0.1");
    }
}
