//! In-memory peer registry
//!
//! Holds one liveness record per peer id behind a single `RwLock`. Mutations
//! (`register`, `heartbeat`, `purge_expired`) take the write half, `list`
//! takes the read half, so a listing never observes a record mid-update.
//!
//! A record is active while `now - last_seen <= liveness_timeout`. Listings
//! filter on that condition themselves; the background sweeper only frees
//! memory held by records that already stopped being listed.
//!
//! The default timeout is [`HEARTBEAT_TOLERANCE`] times the default heartbeat
//! interval, so a peer survives two lost heartbeats in a row.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::models::{validate_peer_id, Peer};

/// Heartbeats a peer may miss before it drops out of listings
pub const HEARTBEAT_TOLERANCE: u32 = 3;

/// Interval at which participants are expected to heartbeat
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Time after the last heartbeat at which a peer stops being listed
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown peer: {0}")]
    UnknownPeer(String),
}

#[derive(Debug, Clone)]
struct PeerRecord {
    ip: String,
    port: u16,
    last_seen: Instant,
    last_seen_at: DateTime<Utc>,
}

impl PeerRecord {
    fn is_active(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) <= timeout
    }

    fn touch(&mut self, now: Instant, now_utc: DateTime<Utc>) {
        // Never move last_seen backwards
        if now >= self.last_seen {
            self.last_seen = now;
            self.last_seen_at = now_utc;
        }
    }

    fn to_peer(&self, id: &str) -> Peer {
        Peer {
            id: id.to_string(),
            ip: self.ip.clone(),
            port: self.port,
            last_seen: Some(self.last_seen_at),
        }
    }
}

/// Shared handle to the peer map. Cloning is cheap and every clone sees the
/// same records.
#[derive(Clone)]
pub struct PeerRegistry {
    peers: Arc<RwLock<HashMap<String, PeerRecord>>>,
    clock: Arc<dyn Clock>,
    liveness_timeout: Duration,
}

impl PeerRegistry {
    pub fn new(liveness_timeout: Duration) -> Self {
        Self::with_clock(liveness_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(liveness_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            peers: Arc::new(RwLock::new(HashMap::new())),
            clock,
            liveness_timeout,
        }
    }

    pub fn liveness_timeout(&self) -> Duration {
        self.liveness_timeout
    }

    /// Create or overwrite the record for `id` and mark it seen now.
    pub async fn register(&self, id: &str, ip: &str, port: u16) -> Result<(), RegistryError> {
        validate_peer_id(id).map_err(RegistryError::InvalidArgument)?;
        if port == 0 {
            return Err(RegistryError::InvalidArgument(
                "Port must be in 1..=65535 (got 0)".to_string(),
            ));
        }
        if ip.trim().is_empty() {
            return Err(RegistryError::InvalidArgument(
                "Peer address must not be empty".to_string(),
            ));
        }

        let mut peers = self.peers.write().await;
        let now = self.clock.now();
        let now_utc = self.clock.utc_now();

        match peers.get_mut(id) {
            Some(record) => {
                let was_active = record.is_active(now, self.liveness_timeout);
                record.ip = ip.to_string();
                record.port = port;
                record.touch(now, now_utc);
                if was_active {
                    debug!("Refreshed registration of peer {} at {}:{}", id, ip, port);
                } else {
                    info!("Peer {} re-registered at {}:{}", id, ip, port);
                }
            }
            None => {
                peers.insert(
                    id.to_string(),
                    PeerRecord {
                        ip: ip.to_string(),
                        port,
                        last_seen: now,
                        last_seen_at: now_utc,
                    },
                );
                info!(
                    "Registered peer {} at {}:{} (peers_count={})",
                    id,
                    ip,
                    port,
                    peers.len()
                );
            }
        }

        metrics::increment_counter!("presence_registrations_total");
        Ok(())
    }

    /// Refresh `last_seen` for a registered, still active peer.
    ///
    /// Returns the new wall-clock `last_seen`. Never creates a record: unknown
    /// ids and ids whose record already expired yield `UnknownPeer`, and the
    /// expired record is dropped so the peer has to register again.
    pub async fn heartbeat(&self, id: &str) -> Result<DateTime<Utc>, RegistryError> {
        validate_peer_id(id).map_err(RegistryError::InvalidArgument)?;

        let mut peers = self.peers.write().await;
        let now = self.clock.now();

        let active = match peers.get(id) {
            Some(record) => record.is_active(now, self.liveness_timeout),
            None => {
                debug!("Heartbeat from unknown peer {}", id);
                metrics::increment_counter!("presence_unknown_heartbeats_total");
                return Err(RegistryError::UnknownPeer(id.to_string()));
            }
        };

        if !active {
            peers.remove(id);
            info!("Heartbeat from expired peer {}, record dropped", id);
            metrics::increment_counter!("presence_unknown_heartbeats_total");
            metrics::increment_counter!("presence_expired_total");
            return Err(RegistryError::UnknownPeer(id.to_string()));
        }

        let now_utc = self.clock.utc_now();
        let record = peers
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownPeer(id.to_string()))?;
        record.touch(now, now_utc);
        debug!("Heartbeat from peer {}", id);
        metrics::increment_counter!("presence_heartbeats_total");

        Ok(record.last_seen_at)
    }

    /// All active peers. Order is unspecified.
    pub async fn list(&self) -> Vec<Peer> {
        let peers = self.peers.read().await;
        let now = self.clock.now();

        let mut active: Vec<Peer> = peers
            .iter()
            .filter(|(_, record)| record.is_active(now, self.liveness_timeout))
            .map(|(id, record)| record.to_peer(id))
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));

        metrics::gauge!("presence_active_peers", active.len() as f64);
        active
    }

    /// A single active peer.
    pub async fn get(&self, id: &str) -> Option<Peer> {
        let peers = self.peers.read().await;
        let now = self.clock.now();
        peers
            .get(id)
            .filter(|record| record.is_active(now, self.liveness_timeout))
            .map(|record| record.to_peer(id))
    }

    /// Remove every record with `now - last_seen > liveness_timeout`.
    pub async fn purge_expired(&self, now: Instant) -> usize {
        let mut peers = self.peers.write().await;
        let before = peers.len();
        peers.retain(|id, record| {
            let keep = record.is_active(now, self.liveness_timeout);
            if !keep {
                info!("Peer expired: {} last_seen={}", id, record.last_seen_at.to_rfc3339());
            }
            keep
        });
        let removed = before - peers.len();

        if removed > 0 {
            metrics::counter!("presence_expired_total", removed as u64);
            info!("Peers purged: before={} after={}", before, peers.len());
        }
        removed
    }

    /// [`PeerRegistry::purge_expired`] at the registry clock's current time.
    pub async fn purge_expired_now(&self) -> usize {
        let now = self.clock.now();
        self.purge_expired(now).await
    }

    /// Stored records, including expired ones the sweeper has not reached yet.
    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    pub async fn active_count(&self) -> usize {
        let peers = self.peers.read().await;
        let now = self.clock.now();
        peers
            .values()
            .filter(|record| record.is_active(now, self.liveness_timeout))
            .count()
    }
}

/// Periodically purge expired records.
pub fn spawn_sweeper(registry: PeerRegistry, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        info!("Expiry sweeper started (interval={:?})", every);
        loop {
            ticker.tick().await;
            let removed = registry.purge_expired_now().await;
            debug!("Sweep removed {} expired peers", removed);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn registry_with_clock(timeout_secs: u64) -> (PeerRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let registry =
            PeerRegistry::with_clock(Duration::from_secs(timeout_secs), clock.clone());
        (registry, clock)
    }

    #[test]
    fn test_default_timeout_tolerates_missed_heartbeats() {
        assert_eq!(
            DEFAULT_LIVENESS_TIMEOUT,
            DEFAULT_HEARTBEAT_INTERVAL * HEARTBEAT_TOLERANCE
        );
        assert!(DEFAULT_HEARTBEAT_INTERVAL < DEFAULT_LIVENESS_TIMEOUT);
    }

    #[tokio::test]
    async fn test_register_then_list() {
        let (registry, _) = registry_with_clock(60);
        registry.register("p1", "127.0.0.1", 4001).await.unwrap();

        let peers = registry.list().await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].id, "p1");
        assert_eq!(peers[0].ip, "127.0.0.1");
        assert_eq!(peers[0].port, 4001);
        assert!(peers[0].last_seen.is_some());
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_input() {
        let (registry, _) = registry_with_clock(60);

        assert!(matches!(
            registry.register("", "127.0.0.1", 4001).await,
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.register("p1", "127.0.0.1", 0).await,
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.register("p1", "", 4001).await,
            Err(RegistryError::InvalidArgument(_))
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let (registry, _) = registry_with_clock(60);
        registry.register("p1", "10.0.0.1", 4001).await.unwrap();
        let first = registry.list().await;
        registry.register("p1", "10.0.0.1", 4001).await.unwrap();
        let second = registry.list().await;

        assert_eq!(first, second);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_heartbeat_unknown_peer() {
        let (registry, _) = registry_with_clock(60);

        assert_eq!(
            registry.heartbeat("ghost").await,
            Err(RegistryError::UnknownPeer("ghost".to_string()))
        );
        assert!(registry.is_empty().await);
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_heartbeat_empty_id_is_invalid() {
        let (registry, _) = registry_with_clock(60);
        assert!(matches!(
            registry.heartbeat("").await,
            Err(RegistryError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_peer_expires_without_heartbeat() {
        let (registry, clock) = registry_with_clock(60);
        registry.register("p1", "127.0.0.1", 4001).await.unwrap();

        clock.advance(Duration::from_secs(60));
        assert_eq!(registry.list().await.len(), 1, "boundary is still active");

        clock.advance(Duration::from_secs(1));
        assert!(registry.list().await.is_empty());
        assert!(registry.get("p1").await.is_none());
        // Not swept yet, only hidden
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_heartbeats_keep_peer_alive() {
        let (registry, clock) = registry_with_clock(60);
        registry.register("p1", "127.0.0.1", 4001).await.unwrap();

        for _ in 0..20 {
            clock.advance(Duration::from_secs(45));
            registry.heartbeat("p1").await.unwrap();
            assert_eq!(registry.list().await.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_heartbeat_after_expiry_requires_register() {
        let (registry, clock) = registry_with_clock(60);
        registry.register("p1", "127.0.0.1", 4001).await.unwrap();
        clock.advance(Duration::from_secs(120));

        assert_eq!(
            registry.heartbeat("p1").await,
            Err(RegistryError::UnknownPeer("p1".to_string()))
        );
        assert_eq!(registry.len().await, 0);

        registry.register("p1", "127.0.0.1", 4001).await.unwrap();
        assert!(registry.heartbeat("p1").await.is_ok());
    }

    #[tokio::test]
    async fn test_reregister_updates_port_and_resets_expiry() {
        let (registry, clock) = registry_with_clock(60);
        registry.register("p1", "127.0.0.1", 4001).await.unwrap();

        clock.advance(Duration::from_secs(50));
        registry.register("p1", "127.0.0.1", 4002).await.unwrap();
        clock.advance(Duration::from_secs(50));

        let peers = registry.list().await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].port, 4002);
    }

    #[tokio::test]
    async fn test_last_seen_is_non_decreasing() {
        let (registry, clock) = registry_with_clock(60);
        registry.register("p1", "127.0.0.1", 4001).await.unwrap();
        let first = registry.get("p1").await.unwrap().last_seen.unwrap();

        clock.advance(Duration::from_secs(5));
        let beat = registry.heartbeat("p1").await.unwrap();
        let second = registry.get("p1").await.unwrap().last_seen.unwrap();

        assert!(second > first);
        assert_eq!(beat, second);
    }

    #[tokio::test]
    async fn test_purge_expired_counts_removed() {
        let (registry, clock) = registry_with_clock(60);
        registry.register("old-1", "10.0.0.1", 4001).await.unwrap();
        registry.register("old-2", "10.0.0.2", 4001).await.unwrap();
        clock.advance(Duration::from_secs(40));
        registry.register("fresh", "10.0.0.3", 4001).await.unwrap();
        clock.advance(Duration::from_secs(30));

        assert_eq!(registry.purge_expired_now().await, 2);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.active_count().await, 1);
        assert_eq!(registry.purge_expired_now().await, 0);
    }

    #[tokio::test]
    async fn test_lazy_and_swept_expiry_agree() {
        let (registry, clock) = registry_with_clock(60);
        registry.register("a", "10.0.0.1", 4001).await.unwrap();
        clock.advance(Duration::from_secs(30));
        registry.register("b", "10.0.0.2", 4001).await.unwrap();
        clock.advance(Duration::from_secs(45));

        let lazy = registry.list().await;
        registry.purge_expired_now().await;
        let swept = registry.list().await;

        assert_eq!(lazy, swept);
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].id, "b");
    }

    #[tokio::test]
    async fn test_sweeper_reclaims_expired_records() {
        let registry = PeerRegistry::new(Duration::from_millis(50));
        registry.register("p1", "127.0.0.1", 4001).await.unwrap();

        let handle = spawn_sweeper(registry.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(registry.len().await, 0);
        handle.abort();
    }
}
