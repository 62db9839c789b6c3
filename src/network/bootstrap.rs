use anyhow::{Context, Result};
use log::{info, warn};
use reqwest::Client;
use url::Url;

use std::collections::HashSet;
use std::time::Duration;

use crate::blockchain::chain::{Chain, ChainSnapshot};
use crate::blockchain::pool::MemoryPool;
use crate::blockchain::transaction::Transaction;
use crate::config::NodeConfig;

use super::peers::{Gossip, PeerRegistry};

const ATTEMPTS: u32 = 10;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Joins the network at startup.
///
/// The node first learns its own externally reachable address by asking the
/// configured bootstrap node for the source IP it observes. A node whose
/// resolved address equals the bootstrap address is the network origin and
/// starts with empty state. Any other node registers the bootstrap peer and
/// pulls its full picture of the world: peer set (unioned), chain and
/// pending pool (both replaced wholesale). It then announces itself to every
/// peer it now knows.
pub async fn bootstrap(
    config: &NodeConfig,
    chain: &Chain,
    pool: &MemoryPool,
    peers: &PeerRegistry,
) -> Result<Url> {
    let client = Client::new();
    let bootstrap_url = &config.bootstrap_url;

    let ip = fetch_public_ip(&client, bootstrap_url).await?;
    let self_url = Url::parse(&format!("http://{}:{}", ip, config.port))
        .context("building this node's url")?;
    peers.set_self_url(self_url.clone());

    if self_url == *bootstrap_url {
        info!("running as the network origin node");
        return Ok(self_url);
    }

    info!("joining the network via {}", bootstrap_url);
    peers.register(bootstrap_url.clone());

    let remote_peers: HashSet<Url> = client
        .get(join(bootstrap_url, "/node")?)
        .send()
        .await?
        .json()
        .await
        .context("pulling the bootstrap peer set")?;
    for peer in remote_peers {
        if peer != self_url {
            peers.register(peer);
        }
    }

    let snapshot: ChainSnapshot = client
        .get(join(bootstrap_url, "/chain")?)
        .send()
        .await?
        .json()
        .await
        .context("pulling the bootstrap chain")?;
    chain.replace(snapshot);

    let pending: Vec<Transaction> = client
        .get(join(bootstrap_url, "/transaction")?)
        .send()
        .await?
        .json()
        .await
        .context("pulling the bootstrap transaction pool")?;
    pool.replace(pending);

    peers.broadcast(Gossip::PeerJoin, &self_url);
    Ok(self_url)
}

/// Asks the bootstrap node which source IP it sees for us. Retries briefly:
/// the origin node queries itself while its own server is still binding.
async fn fetch_public_ip(client: &Client, bootstrap_url: &Url) -> Result<String> {
    let endpoint = join(bootstrap_url, "/node/ip")?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        match client.get(endpoint.clone()).send().await {
            Ok(response) => {
                let ip = response.text().await.context("reading public ip")?;
                return Ok(ip.trim().to_string());
            }
            Err(error) if attempt < ATTEMPTS => {
                warn!(
                    "bootstrap node not reachable yet (attempt {}): {}",
                    attempt, error
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(error) => {
                return Err(error).context("resolving public address via the bootstrap node")
            }
        }
    }
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .with_context(|| format!("joining {} onto {}", path, base))
}
