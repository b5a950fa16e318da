//! Domain layer
//!
//! A replacement consumes exactly one state and produces exactly one
//! state that differs from it only in what the [`Modification`] names.
//! Everything here is pure: both sides derive the same transaction from
//! the same original state, and the acceptor checks the instigator's
//! transaction against that derivation.

use crate::error::{StateReplacementError, StateReplacementResult};
use serde::{Deserialize, Serialize};
use shared_types::{
    Command, OwningKey, Party, SecureHash, StateAndRef, StateRef, TransactionBuildError, TransactionBuilder,
    TransactionState, WireTransaction,
};

/// What changes between the consumed state and its replacement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modification {
    /// Move the state to another notary. The old notary notarises.
    NotaryChange { new_notary: Party },
    /// Move the state under another contract.
    ContractUpgrade { contract: String },
}

impl Modification {
    /// Protocol name the notary change flows initiate under.
    pub const NOTARY_CHANGE: &'static str = "lf.notary-change";
    /// Protocol name the contract upgrade flows initiate under.
    pub const CONTRACT_UPGRADE: &'static str = "lf.contract-upgrade";

    pub fn protocol(&self) -> &'static str {
        match self {
            Modification::NotaryChange { .. } => Self::NOTARY_CHANGE,
            Modification::ContractUpgrade { .. } => Self::CONTRACT_UPGRADE,
        }
    }

    pub fn command_name(&self) -> &'static str {
        match self {
            Modification::NotaryChange { .. } => "NotaryChange",
            Modification::ContractUpgrade { .. } => "ContractUpgrade",
        }
    }

    /// The replacement for `state`.
    pub fn apply(&self, state: &TransactionState) -> TransactionState {
        let mut replaced = state.clone();
        match self {
            Modification::NotaryChange { new_notary } => replaced.notary = new_notary.clone(),
            Modification::ContractUpgrade { contract } => replaced.contract = contract.clone(),
        }
        replaced
    }

    /// Fails when applying would leave `original` as it is.
    pub fn check_applicable(&self, original: &StateAndRef) -> StateReplacementResult<()> {
        if self.apply(&original.state) == original.state {
            return Err(StateReplacementError::NoModification {
                state_ref: original.state_ref,
            });
        }
        Ok(())
    }

    /// The replacement transaction for `original`.
    ///
    /// The transaction stays with the original notary, which is the one
    /// that can attest the input is unconsumed. Every participant signs.
    pub fn assemble(
        &self,
        original: &StateAndRef,
        parameters_hash: SecureHash,
    ) -> Result<WireTransaction, TransactionBuildError> {
        TransactionBuilder::new(Some(original.state.notary.clone()))
            .add_input_state(original)
            .add_output(self.apply(&original.state))
            .add_command(Command::new(self.command_name(), participant_keys(&original.state)))
            .network_parameters(parameters_hash)
            .build()
    }

    /// Check `tx` is exactly the replacement of `original` and nothing more.
    pub fn check_assembled(&self, original: &StateAndRef, tx: &WireTransaction) -> StateReplacementResult<()> {
        let reject = |reason: &str| StateReplacementError::ProposalRejected {
            state_ref: original.state_ref,
            reason: reason.to_string(),
        };
        if tx.inputs() != [original.state_ref] {
            return Err(reject("transaction must consume only the proposed state"));
        }
        if tx.outputs() != [self.apply(&original.state)] {
            return Err(reject("output is not the modified state"));
        }
        if tx.commands() != [Command::new(self.command_name(), participant_keys(&original.state))] {
            return Err(reject("command must be signed by exactly the participants"));
        }
        if !tx.references().is_empty() || !tx.attachments().is_empty() || tx.time_window().is_some() {
            return Err(reject("transaction carries unrelated components"));
        }
        if tx.notary() != Some(&original.state.notary) {
            return Err(reject("transaction must be notarised by the current notary"));
        }
        Ok(())
    }
}

/// Sent by the instigator ahead of each signature request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub state_ref: StateRef,
    pub modification: Modification,
}

impl Proposal {
    pub fn new(state_ref: StateRef, modification: Modification) -> Self {
        Self {
            state_ref,
            modification,
        }
    }
}

/// Distinct participant keys of `state`, in participant order.
pub fn participant_keys(state: &TransactionState) -> Vec<OwningKey> {
    let mut keys: Vec<OwningKey> = Vec::with_capacity(state.data.participants.len());
    for party in &state.data.participants {
        if !keys.contains(&party.owning_key) {
            keys.push(party.owning_key.clone());
        }
    }
    keys
}
