use log::info;

use std::collections::HashSet;
use std::sync::Mutex;

use super::transaction::{Transaction, TransactionError};

/// Pending transactions, keyed by transaction hash.
///
/// Membership is the sole criterion for "pending": the miner draws
/// candidates from here and block acceptance requires every non-reward
/// transaction to still be present. Admission validates the transaction
/// under the same lock that inserts it.
#[derive(Debug, Default)]
pub struct MemoryPool {
    pool: Mutex<HashSet<Transaction>>,
}

impl MemoryPool {
    pub fn new() -> Self {
        MemoryPool {
            pool: Mutex::new(HashSet::new()),
        }
    }

    /// Validates and inserts a transaction in one step. Re-adding a
    /// transaction with the same hash is a no-op.
    pub fn add(&self, transaction: Transaction) -> Result<(), TransactionError> {
        let mut pool = self.pool.lock().unwrap();
        transaction.validate()?;
        info!("transaction {} added to pool", transaction.hash);
        pool.insert(transaction);
        Ok(())
    }

    pub fn remove(&self, transaction: &Transaction) {
        self.pool.lock().unwrap().remove(transaction);
    }

    /// True only if every given transaction is currently pending
    pub fn contains_all<'a>(
        &self,
        transactions: impl IntoIterator<Item = &'a Transaction>,
    ) -> bool {
        let pool = self.pool.lock().unwrap();
        transactions.into_iter().all(|tx| pool.contains(tx))
    }

    /// Removes a settled block's transactions under a single lock, so the
    /// removal is observed atomically by concurrent readers
    pub fn remove_all(&self, transactions: &[Transaction]) {
        let mut pool = self.pool.lock().unwrap();
        for transaction in transactions {
            pool.remove(transaction);
        }
    }

    pub fn snapshot(&self) -> Vec<Transaction> {
        self.pool.lock().unwrap().iter().cloned().collect()
    }

    /// Replaces the whole pool, used by the bootstrap pull
    pub fn replace(&self, transactions: Vec<Transaction>) {
        let mut pool = self.pool.lock().unwrap();
        *pool = transactions.into_iter().collect();
    }

    pub fn len(&self) -> usize {
        self.pool.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::Wallet;

    fn signed_transfer(sender: &Wallet, amount: u64) -> Transaction {
        let recipient = Wallet::new();
        let mut tx = Transaction::new(
            sender.address().clone(),
            recipient.address().clone(),
            amount,
        );
        tx.sign(sender).unwrap();
        tx
    }

    #[test]
    fn test_add_valid_transaction() {
        let pool = MemoryPool::new();
        let tx = signed_transfer(&Wallet::new(), 10);

        pool.add(tx.clone()).unwrap();
        assert_eq!(pool.len(), 1);
        assert!(pool.contains_all([&tx]));
    }

    #[test]
    fn test_reject_unsigned_transaction() {
        let pool = MemoryPool::new();
        let sender = Wallet::new();
        let recipient = Wallet::new();
        let tx = Transaction::new(sender.address().clone(), recipient.address().clone(), 10);

        assert!(matches!(pool.add(tx), Err(TransactionError::NotSigned)));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_reject_reward_transaction() {
        let pool = MemoryPool::new();
        let reward = Transaction::reward(Wallet::new().address().clone(), 50);

        assert!(pool.add(reward).is_err());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_pool_is_keyed_by_hash() {
        let pool = MemoryPool::new();
        let tx = signed_transfer(&Wallet::new(), 10);

        pool.add(tx.clone()).unwrap();
        pool.add(tx.clone()).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_contains_all_requires_every_member() {
        let pool = MemoryPool::new();
        let sender = Wallet::new();
        let present = signed_transfer(&sender, 10);
        let absent = signed_transfer(&sender, 20);

        pool.add(present.clone()).unwrap();
        assert!(pool.contains_all([&present]));
        assert!(!pool.contains_all([&present, &absent]));
    }

    #[test]
    fn test_remove_all() {
        let pool = MemoryPool::new();
        let sender = Wallet::new();
        let a = signed_transfer(&sender, 10);
        let b = signed_transfer(&sender, 20);

        pool.add(a.clone()).unwrap();
        pool.add(b.clone()).unwrap();
        pool.remove_all(&[a, b]);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_replace_is_wholesale() {
        let pool = MemoryPool::new();
        let old = signed_transfer(&Wallet::new(), 10);
        let new = signed_transfer(&Wallet::new(), 20);

        pool.add(old.clone()).unwrap();
        pool.replace(vec![new.clone()]);

        assert!(!pool.contains_all([&old]));
        assert!(pool.contains_all([&new]));
    }
}
