//! # Notary Service Flow
//!
//! Responder to [`crate::NotaryFlow`]. One run handles one request:
//!
//! | Step | Refusal |
//! |------|---------|
//! | Read inputs, references, notary, time window from the payload | `TransactionInvalid` |
//! | Notary is us | `WrongNotary` |
//! | Input and reference count within limit | `TransactionInvalid` |
//! | Network parameters known | `TransactionInvalid` |
//! | Request signed by the counterparty | `RequestSignatureInvalid` |
//! | Validating only: resolve backchain, verify | `TransactionInvalid` |
//! | Commit to the uniqueness provider | `Conflict`, `TimeWindowInvalid` |
//!
//! A full-transaction request is always answered with
//! [`FetchRequest::End`] before the reply, so the requester's vending loop
//! ends whatever the outcome.

use crate::domain::{NotarisationPayload, NotarisationRequest, NotarisationResponse, NotarisedTransaction, NotaryReply};
use crate::error::{NotaryError, NotaryResult};
use crate::metrics;
use crate::ports::{CommitRequest, UniquenessProvider};
use crate::service::NotaryService;
use async_trait::async_trait;
use lf_01_task_engine::{FlowContext, FlowError, FlowExternalOperation, FlowLogic, FlowResult, FlowSession, ServiceHub};
use lf_02_dependency_resolution::{FetchRequest, ResolveTransactionsFlow};
use shared_types::{
    encoding, Party, SecureHash, SignedData, SignedTransaction, StateRef, TimeWindow, TransactionSignature,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the notary needs from a transaction, however it was shown.
struct TransactionParts {
    id: SecureHash,
    inputs: Vec<StateRef>,
    references: Vec<StateRef>,
    notary: Option<Party>,
    time_window: Option<TimeWindow>,
    network_parameters_hash: Option<SecureHash>,
}

impl TransactionParts {
    fn of(transaction: &NotarisedTransaction) -> NotaryResult<Self> {
        match transaction {
            NotarisedTransaction::Full(stx) => Ok(Self {
                id: stx.id(),
                inputs: stx.inputs().to_vec(),
                references: stx.references().to_vec(),
                notary: stx.notary().cloned(),
                time_window: stx.tx.time_window().cloned(),
                network_parameters_hash: stx.tx.network_parameters_hash(),
            }),
            NotarisedTransaction::Filtered(ftx) => {
                ftx.verify().map_err(NotaryError::transaction_invalid)?;
                Ok(Self {
                    id: ftx.id,
                    inputs: ftx.inputs().map_err(NotaryError::transaction_invalid)?,
                    references: ftx.references().map_err(NotaryError::transaction_invalid)?,
                    notary: ftx.notary().map_err(NotaryError::transaction_invalid)?,
                    time_window: ftx.time_window().map_err(NotaryError::transaction_invalid)?,
                    network_parameters_hash: ftx.network_parameters_hash().map_err(NotaryError::transaction_invalid)?,
                })
            }
        }
    }
}

/// Commit run outside the flow so its outcome is journaled.
pub struct CommitOperation {
    provider: Arc<dyn UniquenessProvider>,
    request: CommitRequest,
}

#[async_trait]
impl FlowExternalOperation for CommitOperation {
    type Output = NotaryResult<()>;

    async fn execute(&self, deduplication_id: String) -> FlowResult<NotaryResult<()>> {
        debug!(tx_id = %self.request.tx_id, deduplication_id = %deduplication_id, "Committing input states");
        Ok(self.provider.commit(self.request.clone()).await)
    }
}

/// Handles one notarisation request on `session`.
pub struct NotaryServiceFlow {
    session: FlowSession,
    service: Arc<NotaryService>,
}

impl NotaryServiceFlow {
    pub fn new(session: FlowSession, service: Arc<NotaryService>) -> Self {
        Self { session, service }
    }

    /// Run every check and commit. `Ok(Err(_))` is a refusal to send back;
    /// `Err(_)` means the session itself failed.
    async fn notarise(
        &self,
        ctx: &mut FlowContext,
        payload: NotarisationPayload,
    ) -> FlowResult<NotaryResult<TransactionSignature>> {
        let hub = ctx.hub().clone();
        let parts = match self.check_request(&hub, &payload) {
            Ok(parts) => parts,
            Err(error) => return Ok(Err(error)),
        };

        if self.service.config.validating {
            let NotarisedTransaction::Full(stx) = payload.transaction else {
                return Ok(Err(NotaryError::transaction_invalid(
                    "a validating notary requires the full transaction",
                )));
            };
            if let Err(error) = self.validate(ctx, &hub, *stx).await? {
                return Ok(Err(error));
            }
        }

        let request = CommitRequest {
            states: parts.inputs,
            tx_id: parts.id,
            caller: self.session.counterparty.clone(),
            request_signature: payload.request_signature,
            time_window: parts.time_window,
            references: parts.references,
        };
        let committed = ctx
            .execute_async(CommitOperation {
                provider: self.service.provider.clone(),
                request,
            })
            .await?;
        if let Err(error) = committed {
            return Ok(Err(error));
        }

        let key = hub.legal_identity_key()?;
        let signature = hub
            .keys
            .sign_transaction(&parts.id, &key, hub.signature_metadata())?;
        Ok(Ok(signature))
    }

    fn check_request(&self, hub: &ServiceHub, payload: &NotarisationPayload) -> NotaryResult<TransactionParts> {
        let parts = TransactionParts::of(&payload.transaction)?;
        if parts.notary.as_ref() != Some(&hub.my_identity) {
            return Err(NotaryError::WrongNotary);
        }
        let state_count = parts.inputs.len() + parts.references.len();
        if state_count > self.service.config.max_input_states {
            return Err(NotaryError::transaction_invalid(format!(
                "{state_count} input and reference states exceed the limit of {}",
                self.service.config.max_input_states
            )));
        }
        if let Some(hash) = parts.network_parameters_hash {
            if hub.network_parameters.get(&hash).is_none() {
                return Err(NotaryError::transaction_invalid(format!(
                    "network parameters {hash} are not known to this notary"
                )));
            }
        }
        NotarisationRequest::new(parts.inputs.iter().copied(), parts.id)
            .verify(&payload.request_signature, &self.session.counterparty)?;
        Ok(parts)
    }

    /// Resolve the backchain and verify the transaction, allowing only our
    /// own signature to be missing.
    async fn validate(
        &self,
        ctx: &mut FlowContext,
        hub: &ServiceHub,
        stx: SignedTransaction,
    ) -> FlowResult<NotaryResult<()>> {
        let resolved = ctx
            .sub_flow(ResolveTransactionsFlow::for_transaction(stx.clone(), self.session.clone()).deferring_end())
            .await;
        match resolved {
            Ok(count) => debug!(tx_id = %stx.id(), count, "Backchain resolved for validation"),
            Err(error @ FlowError::Killed { .. }) => return Err(error),
            Err(error) => return Ok(Err(NotaryError::transaction_invalid(error))),
        }
        if let Err(error) = stx.verify_signatures_except(&[hub.my_identity.owning_key.clone()]) {
            return Ok(Err(NotaryError::transaction_invalid(error)));
        }
        Ok(hub
            .verify_transaction(&stx, false)
            .map_err(NotaryError::transaction_invalid))
    }

    fn sign_refusal(&self, hub: &ServiceHub, error: &NotaryError) -> FlowResult<SignedData<NotaryError>> {
        let raw = encoding::encode(error)?;
        let signature = hub.keys.sign(&raw, &hub.legal_identity_key()?)?;
        Ok(SignedData::from_parts(raw, signature))
    }
}

#[async_trait]
impl FlowLogic for NotaryServiceFlow {
    type Output = ();

    fn name(&self) -> &'static str {
        "lf.notary-service"
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<()> {
        metrics::record_request();
        let payload = ctx
            .receive::<NotarisationPayload>(&self.session)
            .await?
            .into_inner();
        let tx_id = payload.transaction.id();
        let full = matches!(payload.transaction, NotarisedTransaction::Full(_));

        let outcome = self.notarise(ctx, payload).await?;
        if full {
            ctx.send(&self.session, &FetchRequest::End).await?;
        }

        let hub = ctx.hub().clone();
        let reply = match outcome {
            Ok(signature) => {
                metrics::record_signed();
                info!(tx_id = %tx_id, requester = %self.session.counterparty, "Transaction notarised");
                NotaryReply::Signed(NotarisationResponse {
                    signatures: vec![signature],
                })
            }
            Err(error) => {
                metrics::record_refused(error.kind());
                warn!(
                    tx_id = %tx_id,
                    requester = %self.session.counterparty,
                    reason = error.kind(),
                    error = %error,
                    "Notarisation refused"
                );
                NotaryReply::Refused(self.sign_refusal(&hub, &error)?)
            }
        };
        ctx.send(&self.session, &reply).await
    }
}
