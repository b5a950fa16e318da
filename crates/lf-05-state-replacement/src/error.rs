//! Error types for state replacement.

use lf_01_task_engine::TransportableError;
use serde::{Deserialize, Serialize};
use shared_types::{PublicKey, SecureHash, StateRef};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum StateReplacementError {
    #[error("{party} is not a participant of {state_ref}")]
    NotAParticipant { state_ref: StateRef, party: String },

    #[error("Proposal for {state_ref} changes nothing")]
    NoModification { state_ref: StateRef },

    #[error("{notary} is not a notary in the current network parameters")]
    UnknownNotary { notary: String },

    #[error("Proposal for {state_ref} rejected: {reason}")]
    ProposalRejected { state_ref: StateRef, reason: String },

    #[error("Upgrade of {state_ref} to {contract} has not been authorised")]
    UpgradeNotAuthorised { state_ref: StateRef, contract: String },

    #[error("This node is not a required signer of {tx_id}")]
    SignatureNotRequired { tx_id: SecureHash },

    #[error("Expected exactly one signature from {party}, received {got}")]
    WrongSignatureCount { party: String, got: usize },

    #[error("Received a signature by {got}, which is not a key of {party}")]
    UnexpectedSigner { party: String, got: PublicKey },

    #[error("Final signature set for {tx_id} is incomplete: {reason}")]
    IncompleteSignatures { tx_id: SecureHash, reason: String },
}

impl TransportableError for StateReplacementError {
    const CODE: &'static str = "state-replacement";
}

pub type StateReplacementResult<T> = Result<T, StateReplacementError>;

#[cfg(test)]
mod tests {
    use super::*;
    use lf_01_task_engine::FlowError;

    #[test]
    fn test_unauthorised_upgrade_crosses_session() {
        let error = StateReplacementError::UpgradeNotAuthorised {
            state_ref: StateRef::new(SecureHash::sha256(b"issue"), 0),
            contract: "test.ContractV2".into(),
        };
        let remote = match error.clone().into_flow_error() {
            FlowError::Exception(ex) => FlowError::Remote(ex),
            other => other,
        };
        assert_eq!(StateReplacementError::from_flow_error(&remote), Some(error));
    }
}
