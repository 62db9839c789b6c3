use std::sync::Arc;

use minichain::blockchain::{Block, Chain, MemoryPool, Transaction, Wallet};
use minichain::miner::Miner;
use minichain::network::PeerRegistry;

/// Drives one full mining cycle the way the worker loop does: a search that
/// solves at nonce 0 yields a block the chain rejects (non-genesis blocks
/// need a positive nonce), in which case the loop just starts over.
fn mine_and_add(miner: &Miner, chain: &Chain, pool: &MemoryPool) -> Block {
    loop {
        let block = miner.mine_once().expect("uncontended search finds a block");
        if chain.add(&block, pool).is_ok() {
            return block;
        }
    }
}

// The full scenario: reward 50, difficulty one leading zero byte, at most
// two transactions per block.
#[tokio::test]
async fn mining_settles_transactions_and_drains_the_pool() {
    let chain = Arc::new(Chain::new(1, 2));
    let pool = Arc::new(MemoryPool::new());
    let peers = Arc::new(PeerRegistry::new(tokio::runtime::Handle::current()));

    let reward_wallet = Wallet::new();
    let miner = Miner::new(
        chain.clone(),
        pool.clone(),
        peers,
        reward_wallet.address().clone(),
        50,
    );

    // genesis: one reward transaction, no previous hash
    let genesis = mine_and_add(&miner, &chain, &pool);
    assert!(genesis.previous_hash.is_none());
    assert!(genesis.leading_zero_bytes() >= 1);
    assert_eq!(chain.len(), 1);
    assert_eq!(chain.balance(reward_wallet.address()), Some(50));

    // spend part of the reward
    let recipient = Wallet::new();
    let mut transfer = Transaction::new(
        reward_wallet.address().clone(),
        recipient.address().clone(),
        20,
    );
    transfer.sign(&reward_wallet).unwrap();
    pool.add(transfer.clone()).unwrap();

    // block 2 carries the reward plus the transfer
    let second = mine_and_add(&miner, &chain, &pool);
    assert_eq!(second.previous_hash.as_deref(), Some(genesis.hash.as_str()));
    assert_eq!(second.transactions.len(), 2);
    assert!(second.transactions[0].is_reward);
    assert_eq!(second.transactions[1], transfer);

    assert_eq!(chain.len(), 2);
    assert_eq!(chain.balance(reward_wallet.address()), Some(80)); // 50 - 20 + 50
    assert_eq!(chain.balance(recipient.address()), Some(20));
    assert!(!pool.contains_all([&transfer]));
    assert!(pool.is_empty());
}

// A node that receives a block from a peer runs it through the exact same
// acceptance path as its own mined blocks.
#[tokio::test]
async fn peer_block_acceptance_matches_self_mined_path() {
    let local_chain = Arc::new(Chain::new(1, 2));
    let local_pool = Arc::new(MemoryPool::new());

    let remote_chain = Arc::new(Chain::new(1, 2));
    let remote_pool = Arc::new(MemoryPool::new());
    let peers = Arc::new(PeerRegistry::new(tokio::runtime::Handle::current()));

    let reward_wallet = Wallet::new();
    let remote_miner = Miner::new(
        remote_chain.clone(),
        remote_pool.clone(),
        peers,
        reward_wallet.address().clone(),
        50,
    );

    let genesis = mine_and_add(&remote_miner, &remote_chain, &remote_pool);

    // the same block extends the other node's empty chain
    local_chain.add(&genesis, &local_pool).unwrap();
    assert_eq!(local_chain.tip_hash(), remote_chain.tip_hash());
    assert_eq!(local_chain.balance(reward_wallet.address()), Some(50));

    // replaying it is rejected: it no longer extends the tip
    assert!(local_chain.add(&genesis, &local_pool).is_err());
}

// Bootstrap-style wholesale adoption of a peer's state.
#[tokio::test]
async fn snapshot_pull_reproduces_the_peer_state() {
    let chain = Arc::new(Chain::new(1, 2));
    let pool = Arc::new(MemoryPool::new());
    let peers = Arc::new(PeerRegistry::new(tokio::runtime::Handle::current()));

    let reward_wallet = Wallet::new();
    let miner = Miner::new(
        chain.clone(),
        pool.clone(),
        peers,
        reward_wallet.address().clone(),
        50,
    );
    mine_and_add(&miner, &chain, &pool);

    let recipient = Wallet::new();
    let mut pending = Transaction::new(
        reward_wallet.address().clone(),
        recipient.address().clone(),
        5,
    );
    pending.sign(&reward_wallet).unwrap();
    pool.add(pending.clone()).unwrap();

    // a joining node replaces its chain and pool with the pulled snapshots
    let joiner_chain = Chain::new(1, 2);
    let joiner_pool = MemoryPool::new();
    joiner_chain.replace(chain.snapshot());
    joiner_pool.replace(pool.snapshot());

    assert_eq!(joiner_chain.len(), chain.len());
    assert_eq!(joiner_chain.tip_hash(), chain.tip_hash());
    assert_eq!(joiner_chain.balance(reward_wallet.address()), Some(50));
    assert!(joiner_pool.contains_all([&pending]));
}
