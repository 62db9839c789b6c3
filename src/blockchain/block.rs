use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use std::collections::VecDeque;

use super::transaction::Transaction;

/// Structural validation failures for a block
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("Block has no hash")]
    MissingHash,

    #[error("Non-genesis block requires a positive nonce")]
    InvalidNonce,

    #[error("Block has no merkle root")]
    MissingMerkleRoot,

    #[error("Block has no transactions")]
    NoTransactions,

    #[error("First transaction is not a reward")]
    MissingReward,

    #[error("Merkle root does not match the transaction list")]
    MerkleMismatch,

    #[error("Stored hash does not match the block header")]
    HashMismatch,
}

/// A block header plus its transaction list.
///
/// The header commits to the previous block (hash chaining), to the
/// transaction list (merkle root) and to the proof-of-work solution
/// (nonce). Construction computes merkle root, then timestamp, then the
/// header hash; a block is never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Hex-encoded SHA-256 of the header
    pub hash: String,

    /// Hash of the previous block; absent only for the genesis block
    pub previous_hash: Option<String>,

    /// Creation time, unix milliseconds
    pub timestamp: i64,

    /// Proof-of-work solution
    pub nonce: u64,

    /// Pairwise SHA-256 reduction of the transaction hashes
    pub merkle_root: Option<String>,

    /// Transactions settled by this block; the first one is the reward
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(previous_hash: Option<String>, transactions: Vec<Transaction>, nonce: u64) -> Self {
        let merkle_root = Self::compute_merkle_root(&transactions);
        let mut block = Block {
            hash: String::new(),
            previous_hash,
            timestamp: Utc::now().timestamp_millis(),
            nonce,
            merkle_root,
            transactions,
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Recomputes the header hash over
    /// `previous_hash ∥ merkle_root ∥ nonce ∥ timestamp`.
    pub fn calculate_hash(&self) -> String {
        let mut hasher = Sha256::new();
        if let Some(previous) = &self.previous_hash {
            hasher.update(previous.as_bytes());
        }
        if let Some(root) = &self.merkle_root {
            hasher.update(root.as_bytes());
        }
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(self.timestamp.to_be_bytes());
        hex::encode(hasher.finalize())
    }

    /// Reduces the transaction hashes pairwise to a single root.
    ///
    /// The hashes go into a queue; each step pops two, hashes their
    /// concatenation and pushes the result to the back. An unpaired element
    /// stays in the queue and pairs up in a later pass, so odd counts are
    /// carried, not dropped. Returns `None` for an empty transaction list.
    pub fn compute_merkle_root(transactions: &[Transaction]) -> Option<String> {
        let mut queue: VecDeque<String> =
            transactions.iter().map(|tx| tx.hash.clone()).collect();

        while queue.len() > 1 {
            let mut hasher = Sha256::new();
            if let Some(left) = queue.pop_front() {
                hasher.update(left.as_bytes());
            }
            if let Some(right) = queue.pop_front() {
                hasher.update(right.as_bytes());
            }
            queue.push_back(hex::encode(hasher.finalize()));
        }

        queue.pop_front()
    }

    /// Number of leading zero bytes of the header hash, the proof-of-work
    /// measure. Difficulty is quantized in whole bytes.
    pub fn leading_zero_bytes(&self) -> usize {
        leading_zero_bytes(&self.hash)
    }

    /// Structural validation, in order, stopping at the first failure:
    /// hash present; positive nonce unless genesis; merkle root present;
    /// transactions non-empty; reward first; merkle root and header hash
    /// match their recomputation.
    pub fn validate(&self) -> Result<(), BlockError> {
        if self.hash.is_empty() {
            return Err(BlockError::MissingHash);
        }

        if self.previous_hash.is_some() && self.nonce == 0 {
            return Err(BlockError::InvalidNonce);
        }

        let merkle_root = self
            .merkle_root
            .as_ref()
            .ok_or(BlockError::MissingMerkleRoot)?;

        if self.transactions.is_empty() {
            return Err(BlockError::NoTransactions);
        }

        if !self.transactions[0].is_reward {
            return Err(BlockError::MissingReward);
        }

        if Self::compute_merkle_root(&self.transactions).as_ref() != Some(merkle_root) {
            return Err(BlockError::MerkleMismatch);
        }

        if self.hash != self.calculate_hash() {
            return Err(BlockError::HashMismatch);
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Leading zero bytes of a hex-encoded hash
pub fn leading_zero_bytes(hash: &str) -> usize {
    match hex::decode(hash) {
        Ok(bytes) => bytes.iter().take_while(|byte| **byte == 0).count(),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::Wallet;

    fn reward_tx(amount: u64) -> Transaction {
        Transaction::reward(Wallet::new().address().clone(), amount)
    }

    #[test]
    fn test_merkle_root_is_deterministic() {
        let transactions = vec![reward_tx(50), reward_tx(20), reward_tx(30)];

        let first = Block::compute_merkle_root(&transactions);
        let second = Block::compute_merkle_root(&transactions);

        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_merkle_root_changes_with_any_transaction() {
        let mut transactions = vec![reward_tx(50), reward_tx(20)];
        let before = Block::compute_merkle_root(&transactions);

        transactions[1] = reward_tx(21);
        let changed = Block::compute_merkle_root(&transactions);

        assert_ne!(before, changed);
    }

    #[test]
    fn merkle_carries_odd_element() {
        let transactions = vec![reward_tx(1), reward_tx(2), reward_tx(3)];

        // [a, b, c] -> [c, H(a ∥ b)] -> H(c ∥ H(a ∥ b))
        let pair = hex::encode(Sha256::digest(
            [
                transactions[0].hash.as_bytes(),
                transactions[1].hash.as_bytes(),
            ]
            .concat(),
        ));
        let expected = hex::encode(Sha256::digest(
            [transactions[2].hash.as_bytes(), pair.as_bytes()].concat(),
        ));

        assert_eq!(Block::compute_merkle_root(&transactions), Some(expected));
    }

    #[test]
    fn test_merkle_root_of_empty_list_is_absent() {
        assert_eq!(Block::compute_merkle_root(&[]), None);
    }

    #[test]
    fn test_hash_covers_every_header_field() {
        let block = Block::new(Some("ab".repeat(32)), vec![reward_tx(50)], 7);

        let mut changed = block.clone();
        changed.nonce += 1;
        assert_ne!(changed.calculate_hash(), block.hash);

        let mut changed = block.clone();
        changed.timestamp += 1;
        assert_ne!(changed.calculate_hash(), block.hash);

        let mut changed = block.clone();
        changed.previous_hash = Some("cd".repeat(32));
        assert_ne!(changed.calculate_hash(), block.hash);

        let mut changed = block.clone();
        changed.merkle_root = Some("ef".repeat(32));
        assert_ne!(changed.calculate_hash(), block.hash);
    }

    #[test]
    fn test_leading_zero_bytes() {
        assert_eq!(leading_zero_bytes(&"ab".repeat(32)), 0);
        assert_eq!(leading_zero_bytes(&format!("00{}", "ab".repeat(31))), 1);
        assert_eq!(leading_zero_bytes(&format!("0000{}", "ab".repeat(30))), 2);
        // byte granularity: a single zero nibble does not count
        assert_eq!(leading_zero_bytes(&format!("0a{}", "ab".repeat(31))), 0);
        assert_eq!(leading_zero_bytes("not-hex"), 0);
    }

    #[test]
    fn test_genesis_block_is_valid_with_zero_nonce() {
        let block = Block::new(None, vec![reward_tx(50)], 0);
        assert!(block.validate().is_ok());
    }

    #[test]
    fn test_non_genesis_block_requires_positive_nonce() {
        let block = Block::new(Some("ab".repeat(32)), vec![reward_tx(50)], 0);
        assert!(matches!(block.validate(), Err(BlockError::InvalidNonce)));
    }

    #[test]
    fn test_first_transaction_must_be_reward() {
        let sender = Wallet::new();
        let recipient = Wallet::new();
        let mut transfer =
            Transaction::new(sender.address().clone(), recipient.address().clone(), 5);
        transfer.sign(&sender).unwrap();

        let block = Block::new(None, vec![transfer, reward_tx(50)], 0);
        assert!(matches!(block.validate(), Err(BlockError::MissingReward)));
    }

    #[test]
    fn test_block_without_transactions_is_invalid() {
        let block = Block::new(None, Vec::new(), 0);
        assert!(matches!(
            block.validate(),
            Err(BlockError::MissingMerkleRoot)
        ));

        // even with a root present, an empty list is rejected
        let mut patched = block.clone();
        patched.merkle_root = Some("ab".repeat(32));
        patched.hash = patched.calculate_hash();
        assert!(matches!(
            patched.validate(),
            Err(BlockError::NoTransactions)
        ));
    }

    #[test]
    fn test_tampered_merkle_root_is_rejected() {
        let mut block = Block::new(None, vec![reward_tx(50)], 0);
        block.merkle_root = Some("ef".repeat(32));
        block.hash = block.calculate_hash();

        assert!(matches!(block.validate(), Err(BlockError::MerkleMismatch)));
    }

    #[test]
    fn test_tampered_hash_is_rejected() {
        let mut block = Block::new(None, vec![reward_tx(50)], 0);
        block.hash = "ab".repeat(32);

        assert!(matches!(block.validate(), Err(BlockError::HashMismatch)));
    }
}
