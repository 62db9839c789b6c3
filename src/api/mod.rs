// HTTP request surface of the node

pub mod handlers;
pub mod routes;

// Re-export main components for easier access
pub use handlers::NodeState;
pub use routes::configure_routes;
