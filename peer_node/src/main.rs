use std::env;
use std::error::Error;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use presence_backend::client::{ClientConfig, PeerClient};
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};

mod http;
mod state;

use crate::state::NodeView;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let peer_id = env::var("PEER_ID").unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());
    let peer_port: u16 = env_or("PEER_PORT", 5001);
    let discovery_url =
        env::var("DISCOVERY_URL").unwrap_or_else(|_| ClientConfig::default().base_url);
    let heartbeat_seconds: u64 = env_or("HEARTBEAT_SECONDS", 20);
    let poll_seconds: u64 = env_or("POLL_SECONDS", 10);
    let reregister_seconds: u64 = env_or("REREGISTER_SECONDS", 300);
    let timeout_seconds: u64 = env_or("REQUEST_TIMEOUT_SECONDS", 5);
    let http_port: u16 = env_or("HTTP_PORT", 9090);

    let client = PeerClient::new(ClientConfig {
        base_url: discovery_url.clone(),
        request_timeout: Duration::from_secs(timeout_seconds.max(1)),
        heartbeat_interval: Duration::from_secs(heartbeat_seconds.max(1)),
        poll_interval: Duration::from_secs(poll_seconds.max(1)),
    })?;

    log::info!("Local peer id: {} port={} discovery={}", peer_id, peer_port, discovery_url);

    let view = Arc::new(RwLock::new(NodeView::new(peer_id.clone(), peer_port)));
    http::spawn_http_server(view.clone(), http_port);

    let mut heartbeat_ticker = interval(client.config().heartbeat_interval);
    let mut poll_ticker = interval(client.config().poll_interval);
    let mut reregister_ticker = interval(Duration::from_secs(reregister_seconds.max(1)));
    for ticker in [&mut heartbeat_ticker, &mut poll_ticker, &mut reregister_ticker] {
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    }
    // Registration happens right below; skip the immediate tick
    reregister_ticker.tick().await;

    log::info!(
        "Configured intervals: heartbeat={}s, poll={}s, re-register={}s",
        heartbeat_seconds,
        poll_seconds,
        reregister_seconds
    );

    // Failures are logged by the client; the loop retries on its own schedule
    let mut needs_register = client.register_self(&peer_id, peer_port).await.is_err();
    view.write().await.registered = !needs_register;

    loop {
        tokio::select! {
            _ = heartbeat_ticker.tick() => {
                if needs_register {
                    needs_register = client.register_self(&peer_id, peer_port).await.is_err();
                    if !needs_register {
                        log::info!("registered with discovery as {}", peer_id);
                    }
                } else if let Err(e) = client.send_heartbeat(&peer_id).await {
                    if e.is_unknown_peer() {
                        log::info!("discovery forgot {}, registering again", peer_id);
                        needs_register = true;
                    }
                }
                view.write().await.registered = !needs_register;
            }
            _ = reregister_ticker.tick() => {
                // Refresh our address in case it changed under us
                if client.register_self(&peer_id, peer_port).await.is_ok() {
                    needs_register = false;
                    view.write().await.registered = true;
                }
            }
            _ = poll_ticker.tick() => {
                let fetched = client.fetch_peers().await;
                let mut v = view.write().await;
                let change = v.apply_fetch(fetched);
                for id in &change.discovered {
                    log::info!("peer discovered: {} peers_count={}", id, v.peers.len());
                }
                for id in &change.lost {
                    log::info!("peer lost: {} peers_count={}", id, v.peers.len());
                }
                if change.is_empty() {
                    log::debug!("poll: no change, peers_count={}", v.peers.len());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}
