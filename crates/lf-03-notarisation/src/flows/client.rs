//! # Notary Client
//!
//! Obtains the notary's signature over a transaction the caller has
//! otherwise fully signed.
//!
//! ```text
//! check: notary set, our signatures complete, inputs under this notary
//! sign NotarisationRequest(inputs, id)
//! validating?  ──yes──▶ send Full, serve backchain, receive reply
//!              ──no───▶ send Filtered (retrying), receive reply
//! reply: Signed ⇒ every signature by the notary and valid
//!        Refused ⇒ NotaryException carrying the signed refusal
//! ```

use crate::domain::{NotarisationPayload, NotarisationRequest, NotarisationResponse, NotarisedTransaction, NotaryReply};
use crate::error::{NotaryError, NotaryException};
use async_trait::async_trait;
use lf_01_task_engine::{
    FlowContext, FlowError, FlowLogic, FlowResult, ProgressTracker, ServiceHub, Step, TransportableError,
};
use lf_02_dependency_resolution::DataVendingFlow;
use shared_types::{Party, PublicKey, SecureHash, SignedData, SignedTransaction, TransactionSignature};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Ask the transaction's notary to sign it.
///
/// Returns the notary's signatures. A refusal surfaces as a
/// [`NotaryException`] transported in [`FlowError::Exception`].
pub struct NotaryFlow {
    stx: SignedTransaction,
    tracker: ProgressTracker,
}

impl NotaryFlow {
    /// Name responders are registered under.
    pub const NAME: &'static str = "lf.notarise";

    pub const VERIFYING_LOCAL_SIGNATURES: Step = Step::new("Verifying signatures on the transaction");
    pub const REQUESTING: Step = Step::new("Requesting signature by notary service");
    pub const VALIDATING: Step = Step::new("Validating response from notary service");

    pub fn new(stx: SignedTransaction) -> Self {
        Self {
            stx,
            tracker: ProgressTracker::new(&[Self::VERIFYING_LOCAL_SIGNATURES, Self::REQUESTING, Self::VALIDATING]),
        }
    }

    /// The notary to ask, after checking the transaction is ready for it.
    fn check_transaction(&self, hub: &ServiceHub) -> FlowResult<Party> {
        let notary = self
            .stx
            .notary()
            .cloned()
            .ok_or_else(|| FlowError::illegal(format!("transaction {} has no notary", self.stx.id())))?;
        self.stx.verify_signatures_except(&[notary.owning_key.clone()])?;
        for input in self.stx.inputs() {
            let state = hub.load_state(input)?;
            if state.notary != notary {
                return Err(FlowError::illegal(format!(
                    "input {input} is assigned to {}, not to transaction notary {notary}",
                    state.notary
                )));
            }
        }
        Ok(notary)
    }

    fn validate_signatures(
        &self,
        notary: &Party,
        tx_id: &SecureHash,
        response: NotarisationResponse,
    ) -> FlowResult<Vec<TransactionSignature>> {
        let notary_keys = notary.owning_key.keys();
        for signature in &response.signatures {
            if !notary_keys.contains(&signature.by) {
                return Err(FlowError::illegal(format!(
                    "signature by {} does not belong to notary {notary}",
                    signature.by
                )));
            }
            signature.verify(tx_id)?;
        }
        let signers: BTreeSet<PublicKey> = response.signatures.iter().map(|s| s.by).collect();
        if !notary.owning_key.is_fulfilled_by(&signers) {
            return Err(FlowError::illegal(format!("signatures do not satisfy the key of {notary}")));
        }
        Ok(response.signatures)
    }

    fn refusal(&self, notary: &Party, tx_id: SecureHash, evidence: SignedData<NotaryError>) -> FlowResult<FlowError> {
        if !notary.owning_key.contains(&evidence.sig.by) {
            return Err(FlowError::illegal(format!(
                "refusal signed by {}, which is not a key of notary {notary}",
                evidence.sig.by
            )));
        }
        let error = evidence.verified()?;
        warn!(tx_id = %tx_id, notary = %notary, reason = error.kind(), "Notarisation refused");
        Ok(NotaryException {
            tx_id,
            error,
            evidence: Some(evidence),
        }
        .into_flow_error())
    }
}

#[async_trait]
impl FlowLogic for NotaryFlow {
    type Output = Vec<TransactionSignature>;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initiating(&self) -> bool {
        true
    }

    fn progress_tracker(&self) -> Option<ProgressTracker> {
        Some(self.tracker.clone())
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<Vec<TransactionSignature>> {
        let hub = ctx.hub().clone();
        let tx_id = self.stx.id();

        self.tracker.set_current(Self::VERIFYING_LOCAL_SIGNATURES);
        let notary = self.check_transaction(&hub)?;
        let validating = hub
            .network_parameters
            .current()
            .notary_info(&notary)
            .map(|info| info.validating)
            .ok_or_else(|| FlowError::illegal(format!("{notary} is not a notary on this network")))?;

        self.tracker.set_current(Self::REQUESTING);
        let request_signature = NotarisationRequest::new(self.stx.inputs().iter().copied(), tx_id).sign(&hub)?;
        debug!(tx_id = %tx_id, notary = %notary, validating, "Requesting notarisation");
        let reply = if validating {
            let session = ctx.initiate_flow(&notary)?;
            let payload = NotarisationPayload {
                transaction: NotarisedTransaction::Full(Box::new(self.stx.clone())),
                request_signature,
            };
            ctx.sub_flow(DataVendingFlow::opening_with(session.clone(), payload, &self.stx))
                .await?;
            ctx.receive::<NotaryReply>(&session).await?
        } else {
            let payload = NotarisationPayload {
                transaction: NotarisedTransaction::Filtered(Box::new(self.stx.tx.filter_for_notary()?)),
                request_signature,
            };
            ctx.send_and_receive_with_retry::<NotaryReply, _>(&notary, &payload)
                .await?
        };

        self.tracker.set_current(Self::VALIDATING);
        reply.unwrap(|reply| match reply {
            NotaryReply::Signed(response) => {
                let signatures = self.validate_signatures(&notary, &tx_id, response)?;
                info!(tx_id = %tx_id, notary = %notary, "Transaction notarised");
                Ok(signatures)
            }
            NotaryReply::Refused(evidence) => Err(self.refusal(&notary, tx_id, evidence)?),
        })
    }
}
