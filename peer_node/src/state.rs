use presence_backend::models::Peer;
use serde::Serialize;
use std::collections::HashSet;

/// What this node currently believes about the network
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeView {
    pub id: String,
    pub port: u16,
    /// False until the discovery service accepted our registration
    pub registered: bool,
    /// Reachable peers, ourselves excluded
    pub peers: Vec<Peer>,
}

/// Peers that appeared or disappeared between two polls
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ViewChange {
    pub discovered: Vec<String>,
    pub lost: Vec<String>,
}

impl ViewChange {
    pub fn is_empty(&self) -> bool {
        self.discovered.is_empty() && self.lost.is_empty()
    }
}

impl NodeView {
    pub fn new(id: String, port: u16) -> Self {
        Self {
            id,
            port,
            registered: false,
            peers: Vec::new(),
        }
    }

    /// Replace the peer list with a fresh fetch and report the difference.
    ///
    /// An empty fetch is indistinguishable from an unreachable discovery
    /// service, so it empties the view as well.
    pub fn apply_fetch(&mut self, fetched: Vec<Peer>) -> ViewChange {
        let fetched: Vec<Peer> = fetched.into_iter().filter(|p| p.id != self.id).collect();

        let before: HashSet<&str> = self.peers.iter().map(|p| p.id.as_str()).collect();
        let after: HashSet<&str> = fetched.iter().map(|p| p.id.as_str()).collect();

        let mut change = ViewChange {
            discovered: after.difference(&before).map(|s| s.to_string()).collect(),
            lost: before.difference(&after).map(|s| s.to_string()).collect(),
        };
        change.discovered.sort();
        change.lost.sort();

        self.peers = fetched;
        change
    }
}
