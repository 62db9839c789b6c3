use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::info;
use url::Url;

use std::sync::Arc;

use crate::blockchain::{Block, Chain, MemoryPool, Transaction};
use crate::network::peers::{Gossip, PeerRegistry};

/// Shared node state injected into every handler
pub struct NodeState {
    pub chain: Arc<Chain>,
    pub pool: Arc<MemoryPool>,
    pub peers: Arc<PeerRegistry>,
}

pub type NodeData = web::Data<NodeState>;

/// Optional `?propagate=true` on submission endpoints: forward the accepted
/// payload to all known peers. Re-broadcasts never set it, so gossip does
/// not loop.
#[derive(Debug, serde::Deserialize)]
pub struct PropagateQuery {
    pub propagate: Option<bool>,
}

impl PropagateQuery {
    fn requested(&self) -> bool {
        self.propagate.unwrap_or(false)
    }
}

/// GET /chain: full chain snapshot, blocks plus balances
pub async fn get_chain(state: NodeData) -> impl Responder {
    HttpResponse::Ok().json(state.chain.snapshot())
}

/// POST /block: run the block through chain acceptance; 202 when it
/// extends the chain, 406 with the rejection reason otherwise
pub async fn submit_block(
    state: NodeData,
    block: web::Json<Block>,
    query: web::Query<PropagateQuery>,
) -> impl Responder {
    let block = block.into_inner();
    info!("block {} received", block.hash);

    match state.chain.add(&block, &state.pool) {
        Ok(()) => {
            if query.requested() {
                state.peers.broadcast(Gossip::Block, &block);
            }
            HttpResponse::Accepted().json(serde_json::json!({ "hash": block.hash }))
        }
        Err(error) => {
            info!("block {} rejected: {}", block.hash, error);
            HttpResponse::NotAcceptable().json(serde_json::json!({ "error": error.to_string() }))
        }
    }
}

/// GET /node: the current peer set
pub async fn get_peers(state: NodeData) -> impl Responder {
    HttpResponse::Ok().json(state.peers.snapshot())
}

/// POST /node: register a peer endpoint
pub async fn register_peer(state: NodeData, url: web::Json<Url>) -> impl Responder {
    state.peers.register(url.into_inner());
    HttpResponse::Ok().finish()
}

/// DELETE /node: unregister a peer endpoint
pub async fn unregister_peer(state: NodeData, url: web::Json<Url>) -> impl Responder {
    state.peers.unregister(&url);
    HttpResponse::Ok().finish()
}

/// GET /node/ip: the source address this server observes for the caller;
/// nodes use it to learn their externally reachable address
pub async fn get_public_address(request: HttpRequest) -> impl Responder {
    let ip = request
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default();
    HttpResponse::Ok().body(ip)
}

/// GET /transaction: the pending pool
pub async fn get_pool(state: NodeData) -> impl Responder {
    HttpResponse::Ok().json(state.pool.snapshot())
}

/// POST /transaction: validate into the pool; 202 when pending, 406 with
/// the rejection reason otherwise
pub async fn submit_transaction(
    state: NodeData,
    transaction: web::Json<Transaction>,
    query: web::Query<PropagateQuery>,
) -> impl Responder {
    let transaction = transaction.into_inner();

    match state.pool.add(transaction.clone()) {
        Ok(()) => {
            if query.requested() {
                state.peers.broadcast(Gossip::Transaction, &transaction);
            }
            HttpResponse::Accepted().json(serde_json::json!({ "hash": transaction.hash }))
        }
        Err(error) => {
            info!("transaction {} rejected: {}", transaction.hash, error);
            HttpResponse::NotAcceptable().json(serde_json::json!({ "error": error.to_string() }))
        }
    }
}
