use actix_web::web;

use super::handlers;

/// Wires the request surface onto the actix service
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/chain", web::get().to(handlers::get_chain))
        .route("/block", web::post().to(handlers::submit_block))
        .route("/node", web::get().to(handlers::get_peers))
        .route("/node", web::post().to(handlers::register_peer))
        .route("/node", web::delete().to(handlers::unregister_peer))
        .route("/node/ip", web::get().to(handlers::get_public_address))
        .route("/transaction", web::get().to(handlers::get_pool))
        .route("/transaction", web::post().to(handlers::submit_transaction));
}
