use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use std::sync::Arc;

use minichain::api::{self, NodeState};
use minichain::blockchain::{Address, Chain, MemoryPool, Wallet};
use minichain::config::NodeConfig;
use minichain::miner::Miner;
use minichain::network::{bootstrap, PeerRegistry};

/// Picks the address mining rewards are credited to. Without one configured
/// a throwaway wallet is generated and its key logged so the operator can
/// claim the funds.
fn resolve_reward_address(config: &NodeConfig) -> Result<Address> {
    match &config.reward_address {
        Some(address) => address
            .parse::<Address>()
            .context("invalid reward address"),
        None => {
            let wallet = Wallet::new();
            info!("generated reward wallet: {}", wallet.address());
            info!(
                "reward wallet private key: {}",
                hex::encode(wallet.export_secret_key())
            );
            Ok(wallet.address().clone())
        }
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = NodeConfig::parse();
    let reward_address = resolve_reward_address(&config)?;

    let chain = Arc::new(Chain::new(
        config.difficulty,
        config.max_transactions_per_block,
    ));
    let pool = Arc::new(MemoryPool::new());
    let peers = Arc::new(PeerRegistry::new(tokio::runtime::Handle::current()));
    let miner = Arc::new(Miner::new(
        chain.clone(),
        pool.clone(),
        peers.clone(),
        reward_address,
        config.reward_amount,
    ));

    let state = web::Data::new(NodeState {
        chain: chain.clone(),
        pool: pool.clone(),
        peers: peers.clone(),
    });

    info!("starting http interface on port {}", config.port);
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(api::configure_routes)
    })
    .bind(("0.0.0.0", config.port))
    .with_context(|| format!("binding port {}", config.port))?
    .run();

    // The bootstrap pull runs alongside the server: the origin node resolves
    // its own address against itself, so the interface must already be up.
    // Mining starts once the node knows where it stands in the network.
    {
        let config = config.clone();
        let chain = chain.clone();
        let pool = pool.clone();
        let peers = peers.clone();
        let miner = miner.clone();
        tokio::spawn(async move {
            match bootstrap::bootstrap(&config, &chain, &pool, &peers).await {
                Ok(url) => {
                    info!("node reachable at {}", url);
                    miner.start();
                }
                Err(error) => warn!("bootstrap failed, not mining: {:#}", error),
            }
        });
    }

    server.await.context("http server")?;

    miner.stop();
    peers.announce_shutdown().await;
    Ok(())
}
