use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::collections::HashMap;

use super::crypto::Address;
use super::transaction::Transaction;

/// Errors that can occur while settling transactions
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Transaction has no sender")]
    MissingSender,
}

/// Current balance of every account that has ever been credited.
///
/// Addresses without an entry have balance 0. The ledger is mutated only by
/// settlement; a transaction must be settled exactly once, in block order;
/// re-settling double-applies it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountLedger {
    balances: HashMap<Address, u64>,
}

impl AccountLedger {
    pub fn new() -> Self {
        AccountLedger {
            balances: HashMap::new(),
        }
    }

    pub fn from_balances(balances: HashMap<Address, u64>) -> Self {
        AccountLedger { balances }
    }

    /// Balance of an account, 0 when the address has never been credited
    pub fn balance(&self, address: &Address) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Whether the address has a tracked balance entry
    pub fn contains(&self, address: &Address) -> bool {
        self.balances.contains_key(address)
    }

    pub fn credit(&mut self, address: &Address, amount: u64) {
        *self.balances.entry(address.clone()).or_insert(0) += amount;
    }

    /// Applies one transaction's economic effect.
    ///
    /// A reward credits its recipient. A transfer debits the sender and
    /// credits the recipient if the sender can cover the amount; otherwise
    /// it fails with no balance change.
    pub fn settle(&mut self, transaction: &Transaction) -> Result<(), LedgerError> {
        if transaction.is_reward {
            self.credit(&transaction.recipient, transaction.amount);
            return Ok(());
        }

        let sender = transaction
            .sender
            .as_ref()
            .ok_or(LedgerError::MissingSender)?;

        let available = self.balance(sender);
        if available < transaction.amount {
            return Err(LedgerError::InsufficientFunds {
                required: transaction.amount,
                available,
            });
        }

        self.balances.insert(sender.clone(), available - transaction.amount);
        self.credit(&transaction.recipient, transaction.amount);
        Ok(())
    }

    /// Settles a whole block's transactions all-or-nothing: every settlement
    /// is staged on a scratch copy and committed only if the full list
    /// succeeds, so a mid-list failure leaves the ledger untouched.
    pub fn settle_all(&mut self, transactions: &[Transaction]) -> Result<(), LedgerError> {
        let mut staged = self.clone();
        for transaction in transactions {
            staged.settle(transaction)?;
        }
        *self = staged;
        Ok(())
    }

    pub fn balances(&self) -> &HashMap<Address, u64> {
        &self.balances
    }
}
