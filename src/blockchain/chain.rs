use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::collections::HashMap;
use std::sync::Mutex;

use super::block::{Block, BlockError};
use super::crypto::Address;
use super::ledger::{AccountLedger, LedgerError};
use super::pool::MemoryPool;

/// Rejection reasons at the chain-acceptance boundary
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Invalid block: {0}")]
    InvalidBlock(#[from] BlockError),

    #[error("Block does not extend the current tip")]
    TipMismatch,

    #[error("Block has {count} transactions, the maximum is {max}")]
    TooManyTransactions { count: usize, max: usize },

    #[error("Block contains transactions that are not in the pending pool")]
    NotPending,

    #[error("Not enough work: {found} leading zero bytes, {required} required")]
    InsufficientDifficulty { found: usize, required: usize },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Full chain state for the wire: the blocks plus the balances they imply.
/// Bootstrap replaces both wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub blocks: Vec<Block>,
    pub balances: HashMap<Address, u64>,
}

/// The ordered sequence of accepted blocks and the account ledger that
/// reflects every settled transaction.
///
/// The chain only ever grows by appending to the tail; there is no fork
/// resolution and no reorg. Acceptance runs as one critical section, so a
/// block's ledger mutation, append and pool drain are observed atomically.
#[derive(Debug)]
pub struct Chain {
    inner: Mutex<ChainInner>,
    difficulty: usize,
    max_transactions_per_block: usize,
}

#[derive(Debug, Default)]
struct ChainInner {
    blocks: Vec<Block>,
    ledger: AccountLedger,
}

impl Chain {
    pub fn new(difficulty: usize, max_transactions_per_block: usize) -> Self {
        Chain {
            inner: Mutex::new(ChainInner::default()),
            difficulty,
            max_transactions_per_block,
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn max_transactions_per_block(&self) -> usize {
        self.max_transactions_per_block
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().blocks.is_empty()
    }

    /// Hash of the current tip, `None` while the chain is empty. The miner
    /// snapshots this as its preemption reference.
    pub fn tip_hash(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .blocks
            .last()
            .map(|block| block.hash.clone())
    }

    /// Ledger balance for a tracked address; `None` when the address has
    /// never been credited
    pub fn balance(&self, address: &Address) -> Option<u64> {
        let inner = self.inner.lock().unwrap();
        inner
            .ledger
            .contains(address)
            .then(|| inner.ledger.balance(address))
    }

    /// Full acceptance pipeline, identical for self-mined and peer-received
    /// blocks:
    /// structural validity, linkage to the current tip (an empty chain only
    /// accepts a block without a previous hash), per-block transaction
    /// limit, pool membership of every non-reward transaction, and
    /// proof-of-work difficulty. On success the block's transactions are
    /// settled all-or-nothing, the block is appended and the settled
    /// transactions leave the pool.
    pub fn add(&self, block: &Block, pool: &MemoryPool) -> Result<(), ChainError> {
        let mut inner = self.inner.lock().unwrap();

        block.validate()?;

        match (inner.blocks.last(), &block.previous_hash) {
            (Some(tip), Some(previous)) if *previous == tip.hash => {}
            (None, None) => {}
            _ => return Err(ChainError::TipMismatch),
        }

        if block.transactions.len() > self.max_transactions_per_block {
            return Err(ChainError::TooManyTransactions {
                count: block.transactions.len(),
                max: self.max_transactions_per_block,
            });
        }

        if !pool.contains_all(block.transactions.iter().filter(|tx| !tx.is_reward)) {
            return Err(ChainError::NotPending);
        }

        let found = block.leading_zero_bytes();
        if found < self.difficulty {
            return Err(ChainError::InsufficientDifficulty {
                found,
                required: self.difficulty,
            });
        }

        inner.ledger.settle_all(&block.transactions)?;
        inner.blocks.push(block.clone());
        pool.remove_all(&block.transactions);

        info!(
            "block {} accepted at height {}",
            block.hash,
            inner.blocks.len()
        );
        Ok(())
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        let inner = self.inner.lock().unwrap();
        ChainSnapshot {
            blocks: inner.blocks.clone(),
            balances: inner.ledger.balances().clone(),
        }
    }

    /// Replaces the whole chain and ledger with a peer's snapshot, used by
    /// the bootstrap pull. The snapshot is trusted as-is.
    pub fn replace(&self, snapshot: ChainSnapshot) {
        let mut inner = self.inner.lock().unwrap();
        info!(
            "replacing chain: {} -> {} blocks",
            inner.blocks.len(),
            snapshot.blocks.len()
        );
        inner.blocks = snapshot.blocks;
        inner.ledger = AccountLedger::from_balances(snapshot.balances);
    }
}
