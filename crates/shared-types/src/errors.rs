//! # Error Types
//!
//! Errors raised by the data model itself. Protocol-level errors live in the
//! protocol crates and wrap these.

use crate::hash::SecureHash;
use crate::identity::{OwningKey, PublicKey};
use crate::transaction::ComponentGroup;
use serde::{Deserialize, Serialize};
use shared_crypto::CryptoError;
use thiserror::Error;

/// Canonical encoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum EncodingError {
    #[error("Failed to encode value: {0}")]
    Encode(String),

    #[error("Failed to decode value: {0}")]
    Decode(String),
}

/// Signature and key failures.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SignatureError {
    /// A signature did not verify against its claimed key.
    #[error("Invalid signature by key {key}")]
    InvalidSignature { key: PublicKey },

    /// Required signers have not signed.
    #[error("Transaction {tx_id} is missing signatures from {} key(s)", missing.len())]
    SignaturesMissing {
        tx_id: SecureHash,
        missing: Vec<OwningKey>,
    },

    /// Composite key whose threshold can never be reached.
    #[error("Invalid composite key: threshold {threshold} exceeds total weight {total_weight}")]
    InvalidCompositeKey { threshold: u32, total_weight: u64 },

    #[error("Crypto failure: {0}")]
    Crypto(String),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl From<CryptoError> for SignatureError {
    fn from(e: CryptoError) -> Self {
        SignatureError::Crypto(e.to_string())
    }
}

/// A filtered view that does not prove membership in the claimed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FilteredTransactionVerificationError {
    #[error("Filtered transaction {id} carries {got} group hashes, expected {expected}")]
    WrongGroupCount {
        id: SecureHash,
        expected: usize,
        got: usize,
    },

    #[error("Group hashes of filtered transaction do not combine to id {id}")]
    IdMismatch { id: SecureHash },

    #[error("Revealed component group {group:?} does not match its hash in {id}")]
    ComponentMismatch { id: SecureHash, group: ComponentGroup },

    #[error("Component group {group:?} of {id} is not visible")]
    ComponentNotVisible { id: SecureHash, group: ComponentGroup },

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Structural problems detected while building or resolving a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TransactionBuildError {
    #[error("Transaction has inputs or references but no notary")]
    NotaryMissing,

    #[error("Input states use different notaries: {first} and {second}")]
    MixedNotaries { first: String, second: String },

    #[error("Duplicate input state {0}")]
    DuplicateInput(String),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}
