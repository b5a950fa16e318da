//! # Acceptor
//!
//! Responder to [`crate::StateReplacementInstigator`]. It signs only a
//! transaction that is exactly the proposed replacement, and records only
//! once it has checked every required signature itself.

use crate::domain::Proposal;
use crate::error::StateReplacementError;
use crate::ports::ProposalVerifier;
use async_trait::async_trait;
use lf_01_task_engine::{
    FlowContext, FlowLogic, FlowResult, FlowSession, ProgressTracker, ServiceHub, Step, TransportableError,
};
use lf_02_dependency_resolution::ReceiveTransactionFlow;
use shared_types::{PublicKey, SignedTransaction, TransactionSignature};
use std::sync::Arc;
use tracing::{info, warn};

pub struct StateReplacementAcceptor {
    session: FlowSession,
    verifier: Arc<dyn ProposalVerifier>,
    tracker: ProgressTracker,
}

impl StateReplacementAcceptor {
    pub const VERIFYING: Step = Step::new("Verifying proposed replacement");
    pub const SIGNING: Step = Step::new("Signing replacement");
    pub const RECORDING: Step = Step::new("Verifying signatures and recording");

    pub fn new(session: FlowSession, verifier: Arc<dyn ProposalVerifier>) -> Self {
        Self {
            session,
            verifier,
            tracker: ProgressTracker::new(&[Self::VERIFYING, Self::SIGNING, Self::RECORDING]),
        }
    }

    /// The one key this node signs with. The legal identity key is
    /// preferred when it is required.
    fn signing_key(hub: &ServiceHub, stx: &SignedTransaction) -> FlowResult<PublicKey> {
        let mut mine = stx
            .required_signing_keys()
            .iter()
            .flat_map(|k| hub.my_keys_for(k))
            .collect::<Vec<_>>();
        if mine.is_empty() {
            return Err(StateReplacementError::SignatureNotRequired { tx_id: stx.id() }.into_flow_error());
        }
        let legal = hub.legal_identity_key()?;
        Ok(if mine.contains(&legal) { legal } else { mine.remove(0) })
    }
}

#[async_trait]
impl FlowLogic for StateReplacementAcceptor {
    type Output = SignedTransaction;

    fn name(&self) -> &'static str {
        "lf.state-replacement-acceptor"
    }

    fn progress_tracker(&self) -> Option<ProgressTracker> {
        Some(self.tracker.clone())
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<SignedTransaction> {
        let hub = ctx.hub().clone();
        let instigator = &self.session.counterparty;

        self.tracker.set_current(Self::VERIFYING);
        let stx = ctx
            .sub_flow(
                ReceiveTransactionFlow::new(self.session.clone())
                    .allowing_missing_signatures()
                    .without_recording(),
            )
            .await?
            .transaction;
        let tx_id = stx.id();
        let proposal = ctx.receive::<Proposal>(&self.session).await?.into_inner();

        let key = Self::signing_key(&hub, &stx)?;
        let original = hub.to_state_and_ref(&proposal.state_ref)?;
        let checked = proposal
            .modification
            .check_assembled(&original, &stx.tx)
            .and_then(|()| self.verifier.verify_proposal(&hub, &original, &proposal));
        if let Err(err) = checked {
            warn!(tx_id = %tx_id, counterparty = %instigator, error = %err, "Replacement proposal refused");
            return Err(err.into_flow_error());
        }
        if !stx.sigs.iter().any(|s| instigator.owning_key.contains(&s.by)) {
            return Err(StateReplacementError::ProposalRejected {
                state_ref: proposal.state_ref,
                reason: format!("transaction is not signed by the instigator {instigator}"),
            }
            .into_flow_error());
        }

        self.tracker.set_current(Self::SIGNING);
        let mine = hub.create_signature(&stx, &key)?;
        let all_signatures = ctx
            .send_and_receive::<Vec<TransactionSignature>, _>(&self.session, &vec![mine.clone()])
            .await?
            .unwrap(|signatures| {
                signatures.iter().try_for_each(|s| s.verify(&tx_id))?;
                Ok(signatures)
            })?;

        self.tracker.set_current(Self::RECORDING);
        let finalised = stx.with_additional_signature(mine).with_additional_signatures(all_signatures);
        if let Err(err) = finalised.verify_required_signatures() {
            return Err(StateReplacementError::IncompleteSignatures {
                tx_id,
                reason: err.to_string(),
            }
            .into_flow_error());
        }
        hub.verify_transaction(&finalised, true)?;
        hub.record_transactions([finalised.clone()]);
        info!(
            tx_id = %tx_id,
            state_ref = %proposal.state_ref,
            counterparty = %instigator,
            "Replacement accepted and recorded"
        );
        Ok(finalised)
    }
}

impl std::fmt::Debug for StateReplacementAcceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateReplacementAcceptor")
            .field("counterparty", &self.session.counterparty.name)
            .finish()
    }
}
