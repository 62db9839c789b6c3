use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use std::hash::{Hash, Hasher};

use super::crypto::{verify_signature, Address, CryptoError, DigitalSignature, Wallet};

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Transaction is not signed")]
    NotSigned,

    #[error("Transaction already signed")]
    AlreadySigned,

    #[error("Transaction has no sender")]
    MissingSender,

    #[error("Stored hash does not match transaction content")]
    HashMismatch,

    #[error("Signature does not verify under the sender's key")]
    InvalidSignature,

    #[error("Wallet address does not match sender address")]
    WalletMismatch,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// A transfer of funds between two accounts, identified by the hash of its
/// content. Reward transactions carry no sender and no signature; they are
/// created by the miner and credit the configured reward address.
///
/// Fields are fixed at construction; the hash is computed once from
/// `amount ∥ sender ∥ recipient ∥ timestamp` and never recomputed into the
/// stored value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Hex-encoded SHA-256 of the transaction content
    pub hash: String,

    /// Sender address; absent for reward transactions
    pub sender: Option<Address>,

    /// Recipient address
    pub recipient: Address,

    /// Amount transferred
    pub amount: u64,

    /// Sender's signature over the transaction content
    pub signature: Option<DigitalSignature>,

    /// Creation time, unix milliseconds
    pub timestamp: i64,

    /// Whether this is a mining reward
    pub is_reward: bool,
}

impl Transaction {
    /// Creates a new unsigned transfer
    pub fn new(sender: Address, recipient: Address, amount: u64) -> Self {
        let mut transaction = Transaction {
            hash: String::new(),
            sender: Some(sender),
            recipient,
            amount,
            signature: None,
            timestamp: Utc::now().timestamp_millis(),
            is_reward: false,
        };
        transaction.hash = transaction.calculate_hash();
        transaction
    }

    /// Creates a mining reward crediting `recipient` with the protocol amount
    pub fn reward(recipient: Address, amount: u64) -> Self {
        let mut transaction = Transaction {
            hash: String::new(),
            sender: None,
            recipient,
            amount,
            signature: None,
            timestamp: Utc::now().timestamp_millis(),
            is_reward: true,
        };
        transaction.hash = transaction.calculate_hash();
        transaction
    }

    /// The content covered by both the hash and the signature:
    /// decimal amount, sender, recipient, big-endian timestamp.
    pub fn content(&self) -> Vec<u8> {
        let mut content = self.amount.to_string().into_bytes();
        if let Some(sender) = &self.sender {
            content.extend_from_slice(sender.as_bytes());
        }
        content.extend_from_slice(self.recipient.as_bytes());
        content.extend_from_slice(&self.timestamp.to_be_bytes());
        content
    }

    /// Recomputes the content hash
    pub fn calculate_hash(&self) -> String {
        hex::encode(Sha256::digest(self.content()))
    }

    /// Signs the transaction with the sender's wallet
    pub fn sign(&mut self, wallet: &Wallet) -> Result<(), TransactionError> {
        if self.signature.is_some() {
            return Err(TransactionError::AlreadySigned);
        }

        match &self.sender {
            Some(sender) if sender == wallet.address() => {}
            Some(_) => return Err(TransactionError::WalletMismatch),
            None => return Err(TransactionError::MissingSender),
        }

        self.signature = Some(wallet.sign(&self.content()));
        Ok(())
    }

    /// Standalone validation, the pool-entry criterion: the transaction must
    /// be signed, its stored hash must match its content, and a non-reward
    /// transaction must carry a sender whose key verifies the signature.
    pub fn validate(&self) -> Result<(), TransactionError> {
        let signature = self.signature.as_ref().ok_or(TransactionError::NotSigned)?;

        if self.hash != self.calculate_hash() {
            return Err(TransactionError::HashMismatch);
        }

        if !self.is_reward {
            let sender = self.sender.as_ref().ok_or(TransactionError::MissingSender)?;
            let public_key = sender.to_public_key()?;

            if !verify_signature(&self.content(), signature, &public_key)? {
                return Err(TransactionError::InvalidSignature);
            }
        }

        Ok(())
    }
}

// Transactions are keyed by content hash wherever sets are involved.
impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Transaction {}

impl Hash for Transaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}
