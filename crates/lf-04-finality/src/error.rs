//! Error types for signature collection and finality.
//!
//! Raised on either side of a collection session and carried to the other,
//! so a signer's rejection reaches the collector as a typed value.

use lf_01_task_engine::TransportableError;
use serde::{Deserialize, Serialize};
use shared_types::{OwningKey, PublicKey, SecureHash};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FinalityError {
    #[error("Transaction {tx_id} must be signed by the collector before collecting signatures")]
    CollectorNotSigned { tx_id: SecureHash },

    #[error("No session given for required signer {key}")]
    NoSessionForKey { key: OwningKey },

    #[error("Session with {party} was given but it is not a required signer")]
    UnneededSession { party: String },

    #[error("Expected {expected} signature(s) from {party}, received {got}")]
    WrongSignatureCount { party: String, expected: usize, got: usize },

    #[error("Received a signature by {got}, which was not requested from {party}")]
    UnexpectedSigner { party: String, got: PublicKey },

    #[error("Transaction {tx_id} is not signed by the initiator {initiator}")]
    InitiatorNotSigned { tx_id: SecureHash, initiator: String },

    #[error("Asked to sign with key(s) this node does not hold")]
    KeysNotHeld { requested: Vec<PublicKey> },

    #[error("None of the requested keys is a required signer of {tx_id}")]
    SignatureNotRequired { tx_id: SecureHash },

    #[error("Transaction {tx_id} rejected: {reason}")]
    TransactionRejected { tx_id: SecureHash, reason: String },

    #[error("Transaction {tx_id} must not be sent to this node's own identity {party}")]
    SelfDelivery { tx_id: SecureHash, party: String },
}

impl TransportableError for FinalityError {
    const CODE: &'static str = "finality";
}

pub type FinalityResult<T> = Result<T, FinalityError>;

#[cfg(test)]
mod tests {
    use super::*;
    use lf_01_task_engine::FlowError;

    #[test]
    fn test_rejection_survives_the_session() {
        let error = FinalityError::TransactionRejected {
            tx_id: SecureHash::sha256(b"tx"),
            reason: "amount too large".into(),
        };
        let remote = match error.clone().into_flow_error() {
            FlowError::Exception(ex) => FlowError::Remote(ex),
            other => other,
        };
        assert_eq!(FinalityError::from_flow_error(&remote), Some(error));
    }

    #[test]
    fn test_other_codes_are_not_decoded() {
        let err = FlowError::exception("plain failure");
        assert_eq!(FinalityError::from_flow_error(&err), None);
    }
}
