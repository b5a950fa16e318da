//! # Service Hub
//!
//! Per-node context threaded into every flow. Holds the node identity, the
//! collaborator ports and the engine configuration. There is no global
//! state; two nodes in one process are two hubs.

use crate::config::FlowConfig;
use crate::error::{FlowError, FlowResult};
use crate::ports::{
    AttachmentStorage, CheckpointStorage, Clock, IdentityService, KeyManagementService,
    MessagingService, NetworkMapCache, NetworkParametersStorage, TransactionStorage,
    TransactionVerifier,
};
use shared_types::{
    OwningKey, Party, PublicKey, SignatureMetadata, SignedTransaction, StateAndRef, StateRef,
    TransactionSignature, TransactionState, WireTransaction,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a flow can reach on its node.
pub struct ServiceHub {
    pub my_identity: Party,
    pub config: FlowConfig,
    pub messaging: Arc<dyn MessagingService>,
    pub checkpoints: Arc<dyn CheckpointStorage>,
    pub transactions: Arc<dyn TransactionStorage>,
    pub attachments: Arc<dyn AttachmentStorage>,
    pub identity: Arc<dyn IdentityService>,
    pub keys: Arc<dyn KeyManagementService>,
    pub network_map: Arc<dyn NetworkMapCache>,
    pub network_parameters: Arc<dyn NetworkParametersStorage>,
    pub verifier: Arc<dyn TransactionVerifier>,
    pub clock: Arc<dyn Clock>,
}

impl ServiceHub {
    pub fn signature_metadata(&self) -> SignatureMetadata {
        SignatureMetadata::new(self.config.platform_version)
    }

    /// The leaf key we sign with by default.
    pub fn legal_identity_key(&self) -> FlowResult<PublicKey> {
        let candidates = self.my_identity.owning_key.keys();
        self.keys
            .filter_my_keys(&candidates)
            .into_iter()
            .next()
            .ok_or_else(|| FlowError::Internal(format!("no private key for {}", self.my_identity)))
    }

    /// Whether `party` is this node.
    pub fn is_local(&self, party: &Party) -> bool {
        if party == &self.my_identity {
            return true;
        }
        let mine = self.keys.keys();
        party.owning_key.keys().iter().any(|k| mine.contains(k))
    }

    /// Leaf keys of `owning_key` held by this node.
    pub fn my_keys_for(&self, owning_key: &OwningKey) -> BTreeSet<PublicKey> {
        self.keys.filter_my_keys(&owning_key.keys())
    }

    pub fn create_signature(&self, stx: &SignedTransaction, key: &PublicKey) -> FlowResult<TransactionSignature> {
        self.keys
            .sign_transaction(&stx.id(), key, self.signature_metadata())
    }

    /// Sign `tx` with `key`, or with the legal identity key.
    pub fn sign_initial_transaction(
        &self,
        tx: WireTransaction,
        key: Option<PublicKey>,
    ) -> FlowResult<SignedTransaction> {
        let key = match key {
            Some(k) => k,
            None => self.legal_identity_key()?,
        };
        let sig = self
            .keys
            .sign_transaction(&tx.id(), &key, self.signature_metadata())?;
        Ok(SignedTransaction::new(tx, vec![sig]))
    }

    pub fn add_signature(&self, stx: &SignedTransaction, key: &PublicKey) -> FlowResult<SignedTransaction> {
        Ok(stx.with_additional_signature(self.create_signature(stx, key)?))
    }

    /// Record verified transactions. Returns how many were new.
    pub fn record_transactions(&self, stxs: impl IntoIterator<Item = SignedTransaction>) -> usize {
        let mut recorded = 0;
        for stx in stxs {
            let id = stx.id();
            if self.transactions.add(stx) {
                recorded += 1;
                info!(tx_id = %id, node = %self.my_identity, "Transaction recorded");
            } else {
                debug!(tx_id = %id, node = %self.my_identity, "Transaction already recorded");
            }
        }
        recorded
    }

    /// Look up the output a reference points at.
    pub fn load_state(&self, state_ref: &StateRef) -> FlowResult<TransactionState> {
        let stx = self
            .transactions
            .get(&state_ref.txhash)
            .ok_or(FlowError::TransactionResolution {
                tx_id: state_ref.txhash,
                missing: state_ref.txhash,
            })?;
        stx.tx
            .outputs()
            .get(state_ref.index as usize)
            .cloned()
            .ok_or_else(|| FlowError::illegal(format!("{state_ref} has no such output")))
    }

    pub fn to_state_and_ref(&self, state_ref: &StateRef) -> FlowResult<StateAndRef> {
        Ok(StateAndRef {
            state: self.load_state(state_ref)?,
            state_ref: *state_ref,
        })
    }

    fn resolve_for(&self, stx: &SignedTransaction, refs: &[StateRef]) -> FlowResult<Vec<TransactionState>> {
        refs.iter()
            .map(|r| {
                self.load_state(r).map_err(|e| match e {
                    FlowError::TransactionResolution { missing, .. } => FlowError::TransactionResolution {
                        tx_id: stx.id(),
                        missing,
                    },
                    other => other,
                })
            })
            .collect()
    }

    /// Verify a transaction against the local ledger: all dependencies
    /// present, input notaries consistent, size within network limits,
    /// signatures valid, contract hook satisfied.
    ///
    /// With `check_sufficient_signatures` every required key must have
    /// signed; otherwise only the attached signatures are checked.
    pub fn verify_transaction(&self, stx: &SignedTransaction, check_sufficient_signatures: bool) -> FlowResult<()> {
        let tx_id = stx.id();
        if check_sufficient_signatures {
            stx.verify_required_signatures()?;
        } else {
            stx.check_signatures_are_valid()?;
        }

        let inputs = self.resolve_for(stx, stx.inputs())?;
        let references = self.resolve_for(stx, stx.references())?;

        if let Some(notary) = stx.notary() {
            if let Some(bad) = inputs.iter().find(|s| &s.notary != notary) {
                return Err(FlowError::TransactionVerification {
                    tx_id,
                    reason: format!("input state notary {} differs from transaction notary {}", bad.notary, notary),
                });
            }
        }

        for attachment in stx.tx.attachments() {
            if !self.attachments.has(attachment) {
                return Err(FlowError::TransactionResolution {
                    tx_id,
                    missing: *attachment,
                });
            }
        }

        let parameters = match stx.tx.network_parameters_hash() {
            Some(hash) => self
                .network_parameters
                .get(&hash)
                .ok_or(FlowError::TransactionResolution { tx_id, missing: hash })?,
            None => self.network_parameters.current(),
        };
        let size = stx.tx.encoded_size()?;
        if size > parameters.max_transaction_size as usize {
            return Err(FlowError::TransactionVerification {
                tx_id,
                reason: format!("size {size} exceeds network maximum {}", parameters.max_transaction_size),
            });
        }

        self.verifier
            .verify(stx, &inputs, &references)
            .map_err(|reason| FlowError::TransactionVerification { tx_id, reason })
    }
}

impl std::fmt::Debug for ServiceHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHub")
            .field("my_identity", &self.my_identity.name)
            .finish()
    }
}
