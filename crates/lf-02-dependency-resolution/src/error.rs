//! Error types for dependency resolution.
//!
//! All variants cross sessions: a vending peer reports `HashNotFound` or
//! `IllegalTransactionRequest` to the requester, and the requester's own
//! failures reach whoever is sending it the transaction.

use lf_01_task_engine::TransportableError;
use serde::{Deserialize, Serialize};
use shared_types::SecureHash;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ResolutionError {
    #[error("Counterparty does not have {requested}")]
    HashNotFound { requested: SecureHash },

    #[error("Requested {requested} but received data hashing to {got}")]
    DownloadedVsRequestedDataMismatch { requested: SecureHash, got: SecureHash },

    #[error("Requested {requested} items but received {got}")]
    DownloadedVsRequestedSizeMismatch { requested: usize, got: usize },

    #[error("Failed to fetch network parameters with hash {requested}")]
    MissingNetworkParameters { requested: SecureHash },

    #[error("Illegal attempt to request {requested}, which is not in the dependency graph of the sent data")]
    IllegalTransactionRequest { requested: SecureHash },

    #[error("Dependency graph exceeds {limit} transactions")]
    ExcessivelyLargeTransactionGraph { limit: usize },

    #[error("Transaction {0} added to the dependency graph twice")]
    DuplicateNode(SecureHash),
}

impl TransportableError for ResolutionError {
    const CODE: &'static str = "resolution";
}

/// Result type for graph operations.
pub type ResolutionResult<T> = Result<T, ResolutionError>;
