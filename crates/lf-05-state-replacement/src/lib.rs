//! # lf-05-state-replacement
//!
//! Replaces one state with a modified copy of itself, signed by every
//! participant and notarised by the notary the state currently lives with.
//!
//! ## Overview
//!
//! | Protocol | Modification | Acceptor agrees when |
//! |----------|--------------|----------------------|
//! | `lf.notary-change` | new notary | the new notary is in the network parameters |
//! | `lf.contract-upgrade` | new contract name | this node authorised that exact upgrade of that state |
//!
//! Both run the same pair of flows. [`StateReplacementInstigator`] builds
//! the transaction, gathers exactly one signature per participant,
//! notarises and records it, and relays every signature back.
//! [`StateReplacementAcceptor`] signs only the exact replacement its
//! [`ProposalVerifier`] agrees to, and records only once it has verified
//! the full signature set itself.
//!
//! ```text
//! original ──(Modification::assemble)──▶ replacement tx
//!                                          │ participants sign
//!                                          │ original notary signs
//!                                          ▼
//!                                  recorded by every participant
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod flows;
pub mod ports;

pub use adapters::{ContractUpgradeVerifier, InMemoryUpgradeAuthorisations, NotaryChangeVerifier};
pub use domain::{Modification, Proposal};
pub use error::{StateReplacementError, StateReplacementResult};
pub use flows::{StateReplacementAcceptor, StateReplacementInstigator};
pub use ports::{ProposalVerifier, UpgradeAuthorisationStore};

use lf_01_task_engine::FlowRegistry;
use std::sync::Arc;

/// Register acceptors for both replacement protocols. Contract upgrades
/// are checked against `authorisations`.
pub fn install_responders(registry: &FlowRegistry, authorisations: Arc<dyn UpgradeAuthorisationStore>) {
    let notary_change: Arc<dyn ProposalVerifier> = Arc::new(NotaryChangeVerifier);
    registry.register_responder(Modification::NOTARY_CHANGE, move |session| {
        StateReplacementAcceptor::new(session, notary_change.clone())
    });
    let contract_upgrade: Arc<dyn ProposalVerifier> = Arc::new(ContractUpgradeVerifier::new(authorisations));
    registry.register_responder(Modification::CONTRACT_UPGRADE, move |session| {
        StateReplacementAcceptor::new(session, contract_upgrade.clone())
    });
    registry.register_flow::<StateReplacementInstigator>(Modification::NOTARY_CHANGE);
    registry.register_flow::<StateReplacementInstigator>(Modification::CONTRACT_UPGRADE);
}

#[cfg(test)]
mod tests;
