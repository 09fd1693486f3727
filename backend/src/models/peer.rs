use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Longest peer id accepted by the registry, in bytes
pub const MAX_PEER_ID_LEN: usize = 128;

/// A reachable participant as reported by `GET /peers`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Peer {
    pub id: String,
    pub ip: String,
    pub port: u16,
    /// Wall-clock time of the latest registration or heartbeat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl Peer {
    pub fn new(id: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            ip: ip.into(),
            port,
            last_seen: None,
        }
    }

    /// `ip:port` string suitable for opening a direct connection
    pub fn address(&self) -> String {
        if self.ip.contains(':') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }
}

/// Body of `POST /register`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub id: String,
    /// Kept wide so out-of-range values are reported as validation errors
    pub port: i64,
    /// Declared address, only used when the connection address is unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Response of `POST /register`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub ip: String,
    pub port: u16,
}

/// Query string of `POST /heartbeat`
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HeartbeatParams {
    /// Id the peer registered with
    #[serde(default)]
    pub peer_id: Option<String>,
}

/// Response of `POST /heartbeat`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HeartbeatResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Check a peer id: non-blank, bounded, no control characters.
pub fn validate_peer_id(id: &str) -> Result<(), String> {
    if id.trim().is_empty() {
        return Err("Peer id must not be empty".to_string());
    }
    if id.len() > MAX_PEER_ID_LEN {
        return Err(format!(
            "Peer id exceeds {} bytes (got {})",
            MAX_PEER_ID_LEN,
            id.len()
        ));
    }
    if id.chars().any(char::is_control) {
        return Err("Peer id must not contain control characters".to_string());
    }
    Ok(())
}

/// Check a listening port and narrow it to `u16`.
pub fn validate_port(port: i64) -> Result<u16, String> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(format!("Port must be in 1..=65535 (got {})", port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_peer_id() {
        assert!(validate_peer_id("p1").is_ok());
        assert!(validate_peer_id("").is_err());
        assert!(validate_peer_id("   ").is_err());
        assert!(validate_peer_id("bad\nid").is_err());
        assert!(validate_peer_id(&"x".repeat(MAX_PEER_ID_LEN)).is_ok());
        assert!(validate_peer_id(&"x".repeat(MAX_PEER_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_port_bounds() {
        assert_eq!(validate_port(1), Ok(1));
        assert_eq!(validate_port(65535), Ok(65535));
        assert!(validate_port(0).is_err());
        assert!(validate_port(-1).is_err());
        assert!(validate_port(65536).is_err());
    }

    #[test]
    fn test_peer_address() {
        assert_eq!(Peer::new("a", "127.0.0.1", 4001).address(), "127.0.0.1:4001");
        assert_eq!(Peer::new("b", "::1", 4001).address(), "[::1]:4001");
    }

    #[test]
    fn test_peer_without_last_seen_omits_field() {
        let json = serde_json::to_value(Peer::new("p1", "10.0.0.1", 4001)).unwrap();
        assert_eq!(json, serde_json::json!({"id": "p1", "ip": "10.0.0.1", "port": 4001}));
    }
}
