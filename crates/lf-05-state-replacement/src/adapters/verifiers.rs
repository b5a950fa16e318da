//! Stock [`ProposalVerifier`]s for the two replacement protocols.

use crate::domain::{Modification, Proposal};
use crate::error::{StateReplacementError, StateReplacementResult};
use crate::ports::{ProposalVerifier, UpgradeAuthorisationStore};
use lf_01_task_engine::ServiceHub;
use shared_types::StateAndRef;
use std::sync::Arc;

fn wrong_kind(original: &StateAndRef, expected: &str) -> StateReplacementError {
    StateReplacementError::ProposalRejected {
        state_ref: original.state_ref,
        reason: format!("expected a {expected} proposal"),
    }
}

/// Accepts a move to any notary in the current network parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotaryChangeVerifier;

impl ProposalVerifier for NotaryChangeVerifier {
    fn verify_proposal(
        &self,
        hub: &ServiceHub,
        original: &StateAndRef,
        proposal: &Proposal,
    ) -> StateReplacementResult<()> {
        let Modification::NotaryChange { new_notary } = &proposal.modification else {
            return Err(wrong_kind(original, "notary change"));
        };
        if hub.network_parameters.current().notary_info(new_notary).is_none() {
            return Err(StateReplacementError::UnknownNotary {
                notary: new_notary.to_string(),
            });
        }
        proposal.modification.check_applicable(original)
    }
}

/// Accepts an upgrade only if this node authorised exactly that upgrade
/// of exactly that state beforehand.
pub struct ContractUpgradeVerifier {
    authorisations: Arc<dyn UpgradeAuthorisationStore>,
}

impl ContractUpgradeVerifier {
    pub fn new(authorisations: Arc<dyn UpgradeAuthorisationStore>) -> Self {
        Self { authorisations }
    }
}

impl ProposalVerifier for ContractUpgradeVerifier {
    fn verify_proposal(
        &self,
        _hub: &ServiceHub,
        original: &StateAndRef,
        proposal: &Proposal,
    ) -> StateReplacementResult<()> {
        let Modification::ContractUpgrade { contract } = &proposal.modification else {
            return Err(wrong_kind(original, "contract upgrade"));
        };
        if self.authorisations.authorised_upgrade(&original.state_ref).as_ref() != Some(contract) {
            return Err(StateReplacementError::UpgradeNotAuthorised {
                state_ref: original.state_ref,
                contract: contract.clone(),
            });
        }
        proposal.modification.check_applicable(original)
    }
}
