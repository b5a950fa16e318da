//! # Instigator
//!
//! ```text
//! Instigator                                   Acceptor (each other participant)
//!   │── SendTransactionFlow(stx) ────────────────▶│ resolve, no recording
//!   │── Proposal{state_ref, modification} ───────▶│ check tx, verify_proposal
//!   │◀── Vec<TransactionSignature> (exactly one) ─│
//!   │   NotaryFlow with the original notary        │
//!   │   record                                     │
//!   │── every participant + notary signature ────▶│ re-verify, record
//! ```

use crate::domain::{Modification, Proposal};
use crate::error::StateReplacementError;
use async_trait::async_trait;
use lf_01_task_engine::{
    FlowContext, FlowError, FlowLogic, FlowResult, FlowSession, ProgressTracker, ServiceHub, Step,
    TransportableError,
};
use lf_02_dependency_resolution::SendTransactionFlow;
use lf_03_notarisation::NotaryFlow;
use serde::{Deserialize, Serialize};
use shared_types::{Party, SecureHash, SignedTransaction, StateAndRef, TransactionSignature};
use tracing::{debug, info};

/// Replace `original` one-for-one with its [`Modification`].
///
/// The caller must be a participant of `original`. Returns the
/// replacement state once it is notarised and recorded.
#[derive(Serialize, Deserialize)]
pub struct StateReplacementInstigator {
    original: StateAndRef,
    modification: Modification,
    #[serde(skip, default = "StateReplacementInstigator::tracker")]
    tracker: ProgressTracker,
}

impl StateReplacementInstigator {
    pub const COLLECTING: Step = Step::new("Collecting signatures from participants");
    pub const NOTARISING: Step = Step::new("Requesting signature by the current notary");
    pub const RECORDING: Step = Step::new("Recording replacement transaction");
    pub const DISTRIBUTING: Step = Step::new("Sending signatures to participants");

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(&[Self::COLLECTING, Self::NOTARISING, Self::RECORDING, Self::DISTRIBUTING])
    }

    pub fn new(original: StateAndRef, modification: Modification) -> Self {
        Self {
            original,
            modification,
            tracker: Self::tracker(),
        }
    }

    pub fn notary_change(original: StateAndRef, new_notary: Party) -> Self {
        Self::new(original, Modification::NotaryChange { new_notary })
    }

    pub fn contract_upgrade(original: StateAndRef, contract: impl Into<String>) -> Self {
        Self::new(
            original,
            Modification::ContractUpgrade {
                contract: contract.into(),
            },
        )
    }

    fn check_preconditions(&self, hub: &ServiceHub) -> FlowResult<()> {
        let state_ref = self.original.state_ref;
        if !self.original.state.data.participants.iter().any(|p| hub.is_local(p)) {
            return Err(StateReplacementError::NotAParticipant {
                state_ref,
                party: hub.my_identity.to_string(),
            }
            .into_flow_error());
        }
        if let Modification::NotaryChange { new_notary } = &self.modification {
            if hub.network_parameters.current().notary_info(new_notary).is_none() {
                return Err(StateReplacementError::UnknownNotary {
                    notary: new_notary.to_string(),
                }
                .into_flow_error());
            }
        }
        self.modification
            .check_applicable(&self.original)
            .map_err(StateReplacementError::into_flow_error)
    }

    /// Every participant other than this node, once each.
    fn counterparties(&self, hub: &ServiceHub) -> Vec<Party> {
        let mut parties: Vec<Party> = Vec::new();
        for party in &self.original.state.data.participants {
            if !hub.is_local(party) && !parties.contains(party) {
                parties.push(party.clone());
            }
        }
        parties
    }

    async fn participant_signature(
        &self,
        ctx: &mut FlowContext,
        session: &FlowSession,
        stx: &SignedTransaction,
    ) -> FlowResult<TransactionSignature> {
        ctx.sub_flow(SendTransactionFlow::new(session.clone(), stx.clone()))
            .await?;
        let proposal = Proposal::new(self.original.state_ref, self.modification.clone());
        let tx_id = stx.id();
        ctx.send_and_receive::<Vec<TransactionSignature>, _>(session, &proposal)
            .await?
            .unwrap(|signatures| check_signature(&session.counterparty, &tx_id, signatures))
    }
}

fn check_signature(
    party: &Party,
    tx_id: &SecureHash,
    mut signatures: Vec<TransactionSignature>,
) -> FlowResult<TransactionSignature> {
    if signatures.len() != 1 {
        return Err(StateReplacementError::WrongSignatureCount {
            party: party.to_string(),
            got: signatures.len(),
        }
        .into_flow_error());
    }
    let signature = signatures.remove(0);
    if !party.owning_key.contains(&signature.by) {
        return Err(StateReplacementError::UnexpectedSigner {
            party: party.to_string(),
            got: signature.by,
        }
        .into_flow_error());
    }
    signature.verify(tx_id)?;
    Ok(signature)
}

#[async_trait]
impl FlowLogic for StateReplacementInstigator {
    type Output = StateAndRef;

    fn name(&self) -> &'static str {
        self.modification.protocol()
    }

    fn initiating(&self) -> bool {
        true
    }

    fn progress_tracker(&self) -> Option<ProgressTracker> {
        Some(self.tracker.clone())
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<StateAndRef> {
        let hub = ctx.hub().clone();
        self.check_preconditions(&hub)?;

        let tx = self
            .modification
            .assemble(&self.original, hub.network_parameters.current_hash())?;
        let stx = hub.sign_initial_transaction(tx, None)?;
        let tx_id = stx.id();
        debug!(tx_id = %tx_id, state_ref = %self.original.state_ref, protocol = self.name(), "Replacement assembled");

        self.tracker.set_current(Self::COLLECTING);
        let mut sessions = Vec::new();
        let mut participant_signatures = Vec::new();
        for party in self.counterparties(&hub) {
            let session = ctx.initiate_flow(&party)?;
            let signature = self.participant_signature(ctx, &session, &stx).await?;
            participant_signatures.push(signature);
            sessions.push(session);
        }
        let all_party_signed = stx.with_additional_signatures(participant_signatures.clone());

        self.tracker.set_current(Self::NOTARISING);
        let notary_signatures = ctx.sub_flow(NotaryFlow::new(all_party_signed.clone())).await?;

        self.tracker.set_current(Self::RECORDING);
        let finalised = all_party_signed.with_additional_signatures(notary_signatures.clone());
        hub.verify_transaction(&finalised, true)?;
        hub.record_transactions([finalised.clone()]);

        self.tracker.set_current(Self::DISTRIBUTING);
        let mut all_signatures = participant_signatures;
        all_signatures.extend(notary_signatures);
        for session in &sessions {
            ctx.send(session, &all_signatures).await?;
        }

        info!(
            tx_id = %tx_id,
            state_ref = %self.original.state_ref,
            protocol = self.name(),
            "State replaced"
        );
        finalised
            .tx
            .out_ref(0)
            .ok_or_else(|| FlowError::Internal(format!("replacement {tx_id} has no output")))
    }
}
