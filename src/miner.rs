use log::{info, warn};

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::blockchain::block::Block;
use crate::blockchain::chain::Chain;
use crate::blockchain::crypto::Address;
use crate::blockchain::ledger::AccountLedger;
use crate::blockchain::pool::MemoryPool;
use crate::blockchain::transaction::Transaction;
use crate::network::peers::{Gossip, PeerRegistry};

/// Miner lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinerState {
    Stopped,
    Running,
}

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;

/// Background proof-of-work search.
///
/// While `Running`, a worker thread repeatedly assembles a candidate block
/// from the pending pool and the current chain tip and iterates the nonce
/// until the block hash meets the difficulty. The search is cancelled
/// cooperatively: the stop flag and the chain tip are checked once per hash
/// attempt, so both stop latency and preemption latency are bounded by a
/// single hash computation.
///
/// A found block is submitted through the same `Chain::add` path as blocks
/// received from peers and broadcast on acceptance; broadcast failures are
/// non-fatal.
pub struct Miner {
    state: AtomicU8,
    worker: Mutex<Option<JoinHandle<()>>>,
    chain: Arc<Chain>,
    pool: Arc<MemoryPool>,
    peers: Arc<PeerRegistry>,
    reward_address: Address,
    reward_amount: u64,
}

impl Miner {
    pub fn new(
        chain: Arc<Chain>,
        pool: Arc<MemoryPool>,
        peers: Arc<PeerRegistry>,
        reward_address: Address,
        reward_amount: u64,
    ) -> Self {
        Miner {
            state: AtomicU8::new(STOPPED),
            worker: Mutex::new(None),
            chain,
            pool,
            peers,
            reward_address,
            reward_amount,
        }
    }

    pub fn state(&self) -> MinerState {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => MinerState::Running,
            _ => MinerState::Stopped,
        }
    }

    /// Transitions `Stopped -> Running` and launches the worker thread.
    /// A no-op if the miner is already running.
    pub fn start(self: &Arc<Self>) {
        if self
            .state
            .compare_exchange(STOPPED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("starting mining service");
            let miner = Arc::clone(self);
            *self.worker.lock().unwrap() = Some(thread::spawn(move || miner.run()));
        }
    }

    /// Transitions `Running -> Stopped` and joins the worker thread.
    /// A no-op if the miner is already stopped.
    pub fn stop(&self) {
        if self
            .state
            .compare_exchange(RUNNING, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("stopping mining service");
            let worker = self.worker.lock().unwrap().take();
            if let Some(handle) = worker {
                let _ = handle.join();
            }
        }
    }

    pub fn reset(self: &Arc<Self>) {
        info!("resetting mining service");
        self.stop();
        self.start();
    }

    fn run(&self) {
        while self.state() == MinerState::Running {
            let cancelled = || self.state() != MinerState::Running;
            if let Some(block) = self.mine_cycle(&cancelled) {
                info!("block mined: {}", block.hash);
                match self.chain.add(&block, &self.pool) {
                    Ok(()) => self.peers.broadcast(Gossip::Block, &block),
                    Err(error) => warn!("mined block {} rejected: {}", block.hash, error),
                }
            }
        }
    }

    /// Runs a single mining cycle to completion, preemptible by a tip
    /// change but not by `stop()`. Primarily useful for driving the miner
    /// deterministically.
    pub fn mine_once(&self) -> Option<Block> {
        self.mine_cycle(&|| false)
    }

    /// One mining cycle: snapshot the tip, pick affordable pending
    /// transactions, prepend the reward and search the nonce space.
    ///
    /// Returns `None` when the search is cancelled or the chain tip changes
    /// underneath it; the caller restarts against fresh state.
    fn mine_cycle(&self, cancelled: &dyn Fn() -> bool) -> Option<Block> {
        let tip = self.chain.tip_hash();
        let mut transactions = self.select_transactions();
        transactions.insert(
            0,
            Transaction::reward(self.reward_address.clone(), self.reward_amount),
        );

        let difficulty = self.chain.difficulty();
        let mut nonce: u64 = 0;
        loop {
            if cancelled() {
                return None;
            }
            // preemption: another block won while we were searching
            if self.chain.tip_hash() != tip {
                info!("chain tip changed, abandoning current search");
                return None;
            }

            let block = Block::new(tip.clone(), transactions.clone(), nonce);
            if block.leading_zero_bytes() >= difficulty {
                return Some(block);
            }
            nonce += 1;
        }
    }

    /// Greedily selects pending transactions that a balance projection says
    /// the sender can afford, reserving one slot for the reward.
    ///
    /// The projection is seeded with the ledger balance of every pool
    /// sender the ledger tracks; senders without an entry cannot spend.
    /// Unaffordable transactions are skipped, not removed; they stay
    /// pending for a later block. Selection follows pool iteration order,
    /// which is unordered.
    fn select_transactions(&self) -> Vec<Transaction> {
        let candidates = self.pool.snapshot();

        let mut projection = AccountLedger::new();
        for transaction in &candidates {
            if let Some(sender) = &transaction.sender {
                if !projection.contains(sender) {
                    if let Some(balance) = self.chain.balance(sender) {
                        projection.credit(sender, balance);
                    }
                }
            }
        }

        let capacity = self.chain.max_transactions_per_block().saturating_sub(1);
        let mut selected = Vec::new();
        for transaction in candidates {
            if selected.len() >= capacity {
                break;
            }

            let tracked = transaction
                .sender
                .as_ref()
                .is_some_and(|sender| projection.contains(sender));
            if !tracked {
                warn!(
                    "skipping transaction {}: sender has no balance entry",
                    transaction.hash
                );
                continue;
            }

            match projection.settle(&transaction) {
                Ok(()) => selected.push(transaction),
                Err(error) => {
                    warn!("skipping transaction {}: {}", transaction.hash, error)
                }
            }
        }
        selected
    }
}
