//! Ports layer
//!
//! Customisation points of the acceptor side.

use crate::domain::Proposal;
use crate::error::StateReplacementResult;
use lf_01_task_engine::ServiceHub;
use shared_types::{StateAndRef, StateRef};

/// Decides whether this node agrees to a proposed replacement.
///
/// Runs after the transaction has been checked to be exactly the proposed
/// replacement of `original`, and before signing.
pub trait ProposalVerifier: Send + Sync {
    fn verify_proposal(&self, hub: &ServiceHub, original: &StateAndRef, proposal: &Proposal)
        -> StateReplacementResult<()>;
}

/// Contract upgrades this node has agreed to ahead of time, keyed by the
/// state to be upgraded.
pub trait UpgradeAuthorisationStore: Send + Sync {
    fn authorise(&self, state_ref: StateRef, contract: String);

    fn authorised_upgrade(&self, state_ref: &StateRef) -> Option<String>;

    /// Returns the withdrawn contract name, if there was one.
    fn deauthorise(&self, state_ref: &StateRef) -> Option<String>;
}
