//! # Signature Collection
//!
//! ```text
//! Collector                                  Signer
//!   │── SendTransactionFlow(stx) ───────────────▶│  ReceiveTransactionFlow
//!   │◀──────── backchain fetches ... End ────────│
//!   │── Vec<PublicKey> (keys to sign with) ─────▶│  keys held? required?
//!   │                                            │  initiator signed? checker
//!   │◀── Vec<TransactionSignature> ──────────────│
//!   │                                            │  wait_for_ledger_commit
//! ```
//!
//! The notary's key is never collected here; finality obtains it.

use crate::error::{FinalityError, FinalityResult};
use crate::ports::TransactionChecker;
use async_trait::async_trait;
use lf_01_task_engine::{
    FlowContext, FlowLogic, FlowResult, FlowSession, ProgressTracker, ServiceHub, Step, TransportableError,
};
use lf_02_dependency_resolution::{ReceiveTransactionFlow, SendTransactionFlow};
use shared_types::{OwningKey, Party, PublicKey, SecureHash, SignedTransaction, TransactionSignature};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Collect the signatures still missing from `stx`, apart from the
/// notary's, from the counterparties behind `sessions`.
///
/// Every session must lead to a required signer and every outstanding key
/// must have a session.
pub struct CollectSignaturesFlow {
    stx: SignedTransaction,
    sessions: Vec<FlowSession>,
    my_keys: Option<Vec<PublicKey>>,
    tracker: ProgressTracker,
}

impl CollectSignaturesFlow {
    pub const COLLECTING: Step = Step::new("Collecting signatures from counterparties");
    pub const VERIFYING: Step = Step::new("Verifying collected signatures");

    pub fn new(stx: SignedTransaction, sessions: Vec<FlowSession>) -> Self {
        Self {
            stx,
            sessions,
            my_keys: None,
            tracker: ProgressTracker::new(&[Self::COLLECTING, Self::VERIFYING]),
        }
    }

    /// Keys the collector signed with, when not its legal identity key.
    pub fn with_my_keys(mut self, keys: Vec<PublicKey>) -> Self {
        self.my_keys = Some(keys);
        self
    }

    /// Pair each session with the outstanding leaf keys its counterparty
    /// owns, resolving every leaf through the identity service. A leaf of a
    /// composite key is asked of whichever party owns that leaf.
    fn plan(&self, hub: &ServiceHub, outstanding: &[OwningKey]) -> FlowResult<Vec<(FlowSession, Vec<PublicKey>)>> {
        let tx_id = self.stx.id();
        let signed: BTreeSet<PublicKey> = self.stx.sigs.iter().map(|s| s.by).collect();
        let mut owed: BTreeMap<Party, BTreeSet<PublicKey>> = BTreeMap::new();
        for key in outstanding {
            for leaf in key.keys().into_iter().filter(|leaf| !signed.contains(leaf)) {
                let owner = match hub.identity.party_from_key(&leaf) {
                    Some(owner) if hub.is_local(&owner) => continue,
                    Some(owner) if self.sessions.iter().any(|s| s.counterparty == owner) => owner,
                    _ => return Err(FinalityError::NoSessionForKey { key: key.clone() }.into_flow_error()),
                };
                owed.entry(owner).or_default().insert(leaf);
            }
        }

        let mut plan = Vec::with_capacity(self.sessions.len());
        for session in &self.sessions {
            let party = &session.counterparty;
            if hub.is_local(party) {
                return Err(FinalityError::SelfDelivery {
                    tx_id,
                    party: party.to_string(),
                }
                .into_flow_error());
            }
            match owed.remove(party) {
                Some(keys) => plan.push((session.clone(), keys.into_iter().collect())),
                None => {
                    return Err(FinalityError::UnneededSession {
                        party: party.to_string(),
                    }
                    .into_flow_error())
                }
            }
        }
        Ok(plan)
    }
}

fn check_response(
    party: &Party,
    tx_id: &SecureHash,
    requested: &[PublicKey],
    signatures: Vec<TransactionSignature>,
) -> FlowResult<Vec<TransactionSignature>> {
    if signatures.len() != requested.len() {
        return Err(FinalityError::WrongSignatureCount {
            party: party.to_string(),
            expected: requested.len(),
            got: signatures.len(),
        }
        .into_flow_error());
    }
    for signature in &signatures {
        if !requested.contains(&signature.by) {
            warn!(tx_id = %tx_id, counterparty = %party, signer = %signature.by, "Unrequested signature");
            return Err(FinalityError::UnexpectedSigner {
                party: party.to_string(),
                got: signature.by,
            }
            .into_flow_error());
        }
        signature.verify(tx_id)?;
    }
    Ok(signatures)
}

#[async_trait]
impl FlowLogic for CollectSignaturesFlow {
    type Output = SignedTransaction;

    fn name(&self) -> &'static str {
        "lf.collect-signatures"
    }

    fn progress_tracker(&self) -> Option<ProgressTracker> {
        Some(self.tracker.clone())
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<SignedTransaction> {
        let hub = ctx.hub().clone();
        let tx_id = self.stx.id();

        self.tracker.set_current(Self::COLLECTING);
        let my_keys: BTreeSet<PublicKey> = match &self.my_keys {
            Some(keys) => keys.iter().copied().collect(),
            None => hub.my_identity.owning_key.keys(),
        };
        if !self.stx.sigs.iter().any(|s| my_keys.contains(&s.by)) {
            return Err(FinalityError::CollectorNotSigned { tx_id }.into_flow_error());
        }
        self.stx.check_signatures_are_valid()?;

        let notary_key = self.stx.notary().map(|n| n.owning_key.clone());
        let outstanding: Vec<OwningKey> = self
            .stx
            .missing_signing_keys()
            .into_iter()
            .filter(|k| Some(k) != notary_key.as_ref())
            .collect();
        if outstanding.is_empty() {
            debug!(tx_id = %tx_id, "No signatures to collect");
            return Ok(self.stx.clone());
        }

        let mut signed = self.stx.clone();
        for (session, requested) in self.plan(&hub, &outstanding)? {
            ctx.sub_flow(SendTransactionFlow::new(session.clone(), self.stx.clone()))
                .await?;
            let signatures = ctx
                .send_and_receive::<Vec<TransactionSignature>, _>(&session, &requested)
                .await?
                .unwrap(|sigs| check_response(&session.counterparty, &tx_id, &requested, sigs))?;
            debug!(tx_id = %tx_id, counterparty = %session.counterparty, count = signatures.len(), "Signatures received");
            signed = signed.with_additional_signatures(signatures);
        }

        self.tracker.set_current(Self::VERIFYING);
        let allowed_missing: Vec<OwningKey> = notary_key.into_iter().collect();
        signed.verify_signatures_except(&allowed_missing)?;
        info!(tx_id = %tx_id, collected = self.sessions.len(), "Signatures collected");
        Ok(signed)
    }
}

/// Responder side of [`CollectSignaturesFlow`].
///
/// Returns the transaction once it is recorded locally as final, unless
/// built with [`SignTransactionFlow::without_waiting_for_commit`].
pub struct SignTransactionFlow {
    session: FlowSession,
    checker: Arc<dyn TransactionChecker>,
    wait_for_commit: bool,
    tracker: ProgressTracker,
}

impl SignTransactionFlow {
    pub const RECEIVING: Step = Step::new("Receiving transaction proposal for signing");
    pub const VERIFYING: Step = Step::new("Verifying transaction proposal");
    pub const SIGNING: Step = Step::new("Signing transaction proposal");
    pub const AWAITING_FINALITY: Step = Step::new("Waiting for the transaction to be finalised");

    pub fn new(session: FlowSession, checker: Arc<dyn TransactionChecker>) -> Self {
        Self {
            session,
            checker,
            wait_for_commit: true,
            tracker: ProgressTracker::new(&[
                Self::RECEIVING,
                Self::VERIFYING,
                Self::SIGNING,
                Self::AWAITING_FINALITY,
            ]),
        }
    }

    /// Return the transaction with our signatures as soon as they are sent.
    pub fn without_waiting_for_commit(mut self) -> Self {
        self.wait_for_commit = false;
        self
    }

    fn check_keys(
        &self,
        hub: &ServiceHub,
        stx: &SignedTransaction,
        requested: Vec<PublicKey>,
    ) -> FinalityResult<Vec<PublicKey>> {
        let wanted: BTreeSet<PublicKey> = requested.iter().copied().collect();
        if wanted.is_empty() || hub.keys.filter_my_keys(&wanted) != wanted {
            return Err(FinalityError::KeysNotHeld { requested });
        }
        let required = stx.required_signing_keys();
        if !wanted.iter().all(|key| required.iter().any(|k| k.contains(key))) {
            return Err(FinalityError::SignatureNotRequired { tx_id: stx.id() });
        }
        Ok(wanted.into_iter().collect())
    }
}

#[async_trait]
impl FlowLogic for SignTransactionFlow {
    type Output = SignedTransaction;

    fn name(&self) -> &'static str {
        "lf.sign-transaction"
    }

    fn progress_tracker(&self) -> Option<ProgressTracker> {
        Some(self.tracker.clone())
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<SignedTransaction> {
        let hub = ctx.hub().clone();
        let initiator = &self.session.counterparty;

        self.tracker.set_current(Self::RECEIVING);
        let stx = ctx
            .sub_flow(
                ReceiveTransactionFlow::new(self.session.clone())
                    .allowing_missing_signatures()
                    .without_recording(),
            )
            .await?
            .transaction;
        let tx_id = stx.id();
        let keys = ctx
            .receive::<Vec<PublicKey>>(&self.session)
            .await?
            .unwrap(|requested| self.check_keys(&hub, &stx, requested).map_err(FinalityError::into_flow_error))?;

        self.tracker.set_current(Self::VERIFYING);
        if !stx.sigs.iter().any(|s| initiator.owning_key.contains(&s.by)) {
            return Err(FinalityError::InitiatorNotSigned {
                tx_id,
                initiator: initiator.to_string(),
            }
            .into_flow_error());
        }
        if let Err(reason) = self.checker.check_transaction(&stx) {
            warn!(tx_id = %tx_id, counterparty = %initiator, reason = %reason, "Refusing to sign");
            return Err(FinalityError::TransactionRejected { tx_id, reason }.into_flow_error());
        }

        self.tracker.set_current(Self::SIGNING);
        let signatures = keys
            .iter()
            .map(|key| hub.create_signature(&stx, key))
            .collect::<FlowResult<Vec<_>>>()?;
        ctx.send(&self.session, &signatures).await?;
        info!(tx_id = %tx_id, counterparty = %initiator, "Transaction signed");

        if !self.wait_for_commit {
            return Ok(stx.with_additional_signatures(signatures));
        }
        self.tracker.set_current(Self::AWAITING_FINALITY);
        ctx.wait_for_ledger_commit(&tx_id).await
    }
}

impl std::fmt::Debug for SignTransactionFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignTransactionFlow")
            .field("counterparty", &self.session.counterparty.name)
            .field("wait_for_commit", &self.wait_for_commit)
            .finish()
    }
}
