use dashmap::DashSet;
use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;
use tokio::runtime::Handle;
use url::Url;

use std::collections::HashSet;
use std::sync::OnceLock;

/// Message kinds a node gossips to its peers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gossip {
    /// An accepted block, POSTed to `/block`
    Block,
    /// A pooled transaction, POSTed to `/transaction`
    Transaction,
    /// This node's own address joining, POSTed to `/node`
    PeerJoin,
    /// This node's own address leaving, DELETEd from `/node`
    PeerLeave,
}

impl Gossip {
    fn path(&self) -> &'static str {
        match self {
            Gossip::Block => "/block",
            Gossip::Transaction => "/transaction",
            Gossip::PeerJoin | Gossip::PeerLeave => "/node",
        }
    }
}

/// The set of known peer endpoints plus this node's own address.
///
/// Broadcast is explicitly unreliable: one fire-and-forget request per peer,
/// dispatched concurrently, no retries, no ordering, failures logged and
/// swallowed. Callers must not assume delivery; a node that misses a
/// message recovers through the bootstrap full pull, never through
/// redelivery.
pub struct PeerRegistry {
    self_url: OnceLock<Url>,
    peers: DashSet<Url>,
    client: reqwest::Client,
    handle: Handle,
}

impl PeerRegistry {
    pub fn new(handle: Handle) -> Self {
        PeerRegistry {
            self_url: OnceLock::new(),
            peers: DashSet::new(),
            client: reqwest::Client::new(),
            handle,
        }
    }

    /// Records this node's externally reachable address, once
    pub fn set_self_url(&self, url: Url) {
        let _ = self.self_url.set(url);
    }

    pub fn self_url(&self) -> Option<&Url> {
        self.self_url.get()
    }

    pub fn register(&self, url: Url) {
        if self.peers.insert(url.clone()) {
            info!("peer registered: {}", url);
        }
    }

    pub fn unregister(&self, url: &Url) {
        if self.peers.remove(url).is_some() {
            info!("peer unregistered: {}", url);
        }
    }

    pub fn snapshot(&self) -> HashSet<Url> {
        self.peers.iter().map(|peer| peer.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Sends `payload` to every known peer for the given message kind.
    ///
    /// Each peer gets its own task; a failure against one peer does not
    /// block, retry, or surface to the others.
    pub fn broadcast<T: Serialize>(&self, kind: Gossip, payload: &T) {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(error) => {
                warn!("broadcast payload does not serialize: {}", error);
                return;
            }
        };

        for peer in self.peers.iter() {
            let endpoint = match peer.join(kind.path()) {
                Ok(endpoint) => endpoint,
                Err(error) => {
                    warn!("unusable peer endpoint {}: {}", *peer, error);
                    continue;
                }
            };

            let request = match kind {
                Gossip::PeerLeave => self.client.delete(endpoint.clone()),
                _ => self.client.post(endpoint.clone()),
            }
            .json(&payload);

            self.handle.spawn(async move {
                if let Err(error) = request.send().await {
                    warn!("broadcast to {} failed: {}", endpoint, error);
                }
            });
        }
    }

    /// Best-effort leave announcement on shutdown: one DELETE per peer,
    /// awaited together, errors logged and dropped
    pub async fn announce_shutdown(&self) {
        let Some(self_url) = self.self_url.get() else {
            return;
        };

        info!("announcing shutdown to {} peers", self.peers.len());
        let requests: Vec<_> = self
            .peers
            .iter()
            .filter_map(|peer| peer.join(Gossip::PeerLeave.path()).ok())
            .map(|endpoint| self.client.delete(endpoint).json(self_url).send())
            .collect();

        for outcome in join_all(requests).await {
            if let Err(error) = outcome {
                warn!("shutdown announcement failed: {}", error);
            }
        }
    }
}
