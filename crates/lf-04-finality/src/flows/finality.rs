//! # Finality
//!
//! ```text
//! verify: all signatures but the notary's, contracts, backchain held
//! needs notary (inputs, references or time window) and not yet signed?
//!     └─▶ NotaryFlow, append signatures
//! record locally
//! for each participant and extra recipient that is not us:
//!     BroadcastTransactionFlow ─▶ ReceiveTransactionFlow (resolve, verify, record)
//! ```

use crate::error::FinalityError;
use async_trait::async_trait;
use lf_01_task_engine::{
    FlowContext, FlowLogic, FlowResult, FlowSession, ProgressTracker, ServiceHub, Step, TransportableError,
};
use lf_02_dependency_resolution::{ReceiveTransactionFlow, SendTransactionFlow};
use lf_03_notarisation::NotaryFlow;
use shared_types::{OwningKey, Party, SignedTransaction};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Notarise if needed, record, and distribute `stx` to everyone involved.
pub struct FinalityFlow {
    stx: SignedTransaction,
    extra_recipients: Vec<Party>,
    tracker: ProgressTracker,
}

impl FinalityFlow {
    pub const NOTARISING: Step = Step::new("Requesting signature by notary service");
    pub const RECORDING: Step = Step::new("Recording transaction locally");
    pub const BROADCASTING: Step = Step::new("Broadcasting transaction to participants");

    pub fn new(stx: SignedTransaction) -> Self {
        Self {
            stx,
            extra_recipients: Vec::new(),
            tracker: ProgressTracker::new(&[Self::NOTARISING, Self::RECORDING, Self::BROADCASTING]),
        }
    }

    /// Also send the final transaction to `parties`, which need not be
    /// participants. Must not include this node.
    pub fn with_extra_recipients(mut self, parties: Vec<Party>) -> Self {
        self.extra_recipients = parties;
        self
    }

    fn needs_notarisation(&self) -> bool {
        match self.stx.notary() {
            Some(notary) => self.stx.tx.needs_notary_signature() && !self.stx.is_signed_by(&notary.owning_key),
            None => false,
        }
    }

    /// Participants of every input and output, then extra recipients, in
    /// a stable order with local identities dropped.
    fn recipients(&self, hub: &ServiceHub) -> FlowResult<Vec<Party>> {
        let tx_id = self.stx.id();
        if let Some(me) = self.extra_recipients.iter().find(|p| hub.is_local(p)) {
            return Err(FinalityError::SelfDelivery {
                tx_id,
                party: me.to_string(),
            }
            .into_flow_error());
        }
        let mut participants: BTreeSet<Party> = self.stx.tx.output_participants();
        for input in self.stx.inputs() {
            participants.extend(hub.load_state(input)?.data.participants);
        }
        let mut recipients: Vec<Party> = participants.into_iter().filter(|p| !hub.is_local(p)).collect();
        for party in &self.extra_recipients {
            if !recipients.contains(party) {
                recipients.push(party.clone());
            }
        }
        Ok(recipients)
    }
}

#[async_trait]
impl FlowLogic for FinalityFlow {
    type Output = SignedTransaction;

    fn name(&self) -> &'static str {
        "lf.finality"
    }

    fn progress_tracker(&self) -> Option<ProgressTracker> {
        Some(self.tracker.clone())
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<SignedTransaction> {
        let hub = ctx.hub().clone();
        let tx_id = self.stx.id();

        let allowed_missing: Vec<OwningKey> = self.stx.notary().map(|n| n.owning_key.clone()).into_iter().collect();
        self.stx.verify_signatures_except(&allowed_missing)?;
        hub.verify_transaction(&self.stx, false)?;
        let recipients = self.recipients(&hub)?;

        self.tracker.set_current(Self::NOTARISING);
        let notarised = if self.needs_notarisation() {
            let signatures = ctx.sub_flow(NotaryFlow::new(self.stx.clone())).await?;
            self.stx.with_additional_signatures(signatures)
        } else {
            debug!(tx_id = %tx_id, "No notarisation needed");
            self.stx.clone()
        };

        self.tracker.set_current(Self::RECORDING);
        hub.verify_transaction(&notarised, true)?;
        hub.record_transactions([notarised.clone()]);

        self.tracker.set_current(Self::BROADCASTING);
        for recipient in recipients {
            ctx.sub_flow(BroadcastTransactionFlow::new(notarised.clone(), recipient))
                .await?;
        }
        info!(tx_id = %tx_id, "Transaction finalised");
        Ok(notarised)
    }
}

/// Send a final transaction to one party, which resolves and records it.
pub struct BroadcastTransactionFlow {
    stx: SignedTransaction,
    recipient: Party,
}

impl BroadcastTransactionFlow {
    /// Name responders are registered under.
    pub const NAME: &'static str = "lf.broadcast-transaction";

    pub fn new(stx: SignedTransaction, recipient: Party) -> Self {
        Self { stx, recipient }
    }
}

#[async_trait]
impl FlowLogic for BroadcastTransactionFlow {
    type Output = ();

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initiating(&self) -> bool {
        true
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<()> {
        let session = ctx.initiate_flow(&self.recipient)?;
        ctx.sub_flow(SendTransactionFlow::new(session, self.stx.clone()))
            .await?;
        debug!(tx_id = %self.stx.id(), recipient = %self.recipient, "Transaction delivered");
        Ok(())
    }
}

/// Responder to [`BroadcastTransactionFlow`].
pub struct ReceiveFinalisedTransactionFlow {
    session: FlowSession,
}

impl ReceiveFinalisedTransactionFlow {
    pub fn new(session: FlowSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl FlowLogic for ReceiveFinalisedTransactionFlow {
    type Output = SignedTransaction;

    fn name(&self) -> &'static str {
        "lf.receive-finalised-transaction"
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<SignedTransaction> {
        let received = ctx
            .sub_flow(ReceiveTransactionFlow::new(self.session.clone()))
            .await?;
        Ok(received.transaction)
    }
}
