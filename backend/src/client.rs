//! Client side of the discovery protocol
//!
//! Every call has a bounded timeout. Failures are logged here and returned so
//! callers can inspect them, but none of them is meant to stop a participant:
//! [`PeerClient::fetch_peers`] folds every failure into an empty list, and
//! the application loop is expected to drop the results of
//! [`PeerClient::register_self`] and [`PeerClient::send_heartbeat`].

use reqwest::{StatusCode, Url};
use serde::Serialize;
use std::time::Duration;
use strum::Display;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Peer;
use crate::registry::DEFAULT_HEARTBEAT_INTERVAL;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, DNS failure, timeout or undecodable body
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Discovery service returned {0}")]
    Status(StatusCode),

    #[error("Peer not registered: {0}")]
    UnknownPeer(String),

    #[error("Invalid discovery URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// The service no longer knows this peer; registering again recovers.
    pub fn is_unknown_peer(&self) -> bool {
        matches!(self, ClientError::UnknownPeer(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Transport(e) if e.is_timeout())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
enum Operation {
    Register,
    Heartbeat,
    FetchPeers,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(5),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            poll_interval: Duration::from_secs(10),
        }
    }
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    id: &'a str,
    port: u16,
}

/// HTTP client for one discovery service
#[derive(Debug, Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    base_url: Url,
    config: ClientConfig,
}

impl PeerClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(config.base_url.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// Active peers, or an empty list when discovery is unreachable or failing.
    pub async fn fetch_peers(&self) -> Vec<Peer> {
        self.try_fetch_peers().await.unwrap_or_default()
    }

    /// Like [`PeerClient::fetch_peers`] but reports why the list is unavailable.
    pub async fn try_fetch_peers(&self) -> ClientResult<Vec<Peer>> {
        let peers = self
            .get_peers()
            .await
            .map_err(|e| log_failure(Operation::FetchPeers, e))?;
        debug!("Fetched {} peers", peers.len());
        Ok(peers)
    }

    /// Announce this process under `id`, listening on `port`.
    pub async fn register_self(&self, id: &str, port: u16) -> ClientResult<()> {
        self.post_register(id, port)
            .await
            .map_err(|e| log_failure(Operation::Register, e))?;
        debug!("Registered as {} on port {}", id, port);
        Ok(())
    }

    /// Refresh liveness for `id`. A 404 comes back as [`ClientError::UnknownPeer`].
    pub async fn send_heartbeat(&self, id: &str) -> ClientResult<()> {
        self.post_heartbeat(id)
            .await
            .map_err(|e| log_failure(Operation::Heartbeat, e))?;
        debug!("Heartbeat sent for {}", id);
        Ok(())
    }

    async fn get_peers(&self) -> ClientResult<Vec<Peer>> {
        let response = self.http.get(self.endpoint("peers")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }
        Ok(response.json::<Vec<Peer>>().await?)
    }

    async fn post_register(&self, id: &str, port: u16) -> ClientResult<()> {
        let response = self
            .http
            .post(self.endpoint("register"))
            .json(&RegisterBody { id, port })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }
        Ok(())
    }

    async fn post_heartbeat(&self, id: &str) -> ClientResult<()> {
        let response = self
            .http
            .post(self.endpoint("heartbeat"))
            .query(&[("peer_id", id)])
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(ClientError::UnknownPeer(id.to_string())),
            status => Err(ClientError::Status(status)),
        }
    }
}

fn log_failure(op: Operation, err: ClientError) -> ClientError {
    warn!("Discovery {} failed: {}", op, err);
    err
}
