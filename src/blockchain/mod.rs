// Core ledger implementation:
// - Transaction structure and standalone validation
// - Block structure, merkle commitment and proof-of-work measure
// - Account ledger and settlement
// - Pending-transaction pool
// - Chain with the block-acceptance pipeline
// - Cryptography utilities

pub mod block;
pub mod chain;
pub mod crypto;
pub mod ledger;
pub mod pool;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Chain, ChainSnapshot};
pub use crypto::{Address, DigitalSignature, Wallet};
pub use ledger::AccountLedger;
pub use pool::MemoryPool;
pub use transaction::Transaction;
