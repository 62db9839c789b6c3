// Peer-to-peer plumbing: the peer registry with its fan-out broadcast, and
// the startup bootstrap pull.

pub mod bootstrap;
pub mod peers;

pub use peers::{Gossip, PeerRegistry};
