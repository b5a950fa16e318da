//! # Notarisation Request
//!
//! The requester signs the list of states it wants consumed together with
//! the consuming transaction id. The notary rebuilds the same request from
//! the transaction it received and checks the signature, so the list must
//! encode identically however the caller ordered it.
//!
//! | Value | Signed bytes |
//! |-------|--------------|
//! | [`NotarisationRequestSignature`] | `encode((request, platform_version))` |

use crate::error::{NotaryError, NotaryResult};
use lf_01_task_engine::{FlowResult, ServiceHub};
use serde::{Deserialize, Serialize};
use shared_types::{
    encoding, DigitalSignatureWithKey, EncodingError, FilteredTransaction, Party, SecureHash, SignedTransaction,
    StateRef, TransactionSignature,
};

/// States to consume and the transaction consuming them, in canonical order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NotarisationRequest {
    states_to_consume: Vec<StateRef>,
    tx_id: SecureHash,
}

impl NotarisationRequest {
    /// Sorted by transaction hash, then output index.
    pub fn new(states: impl IntoIterator<Item = StateRef>, tx_id: SecureHash) -> Self {
        let mut states_to_consume: Vec<StateRef> = states.into_iter().collect();
        states_to_consume.sort();
        Self { states_to_consume, tx_id }
    }

    pub fn states_to_consume(&self) -> &[StateRef] {
        &self.states_to_consume
    }

    pub fn tx_id(&self) -> SecureHash {
        self.tx_id
    }

    fn signable_bytes(&self, platform_version: u32) -> Result<Vec<u8>, EncodingError> {
        encoding::encode(&(self, platform_version))
    }

    /// Sign with this node's legal identity key.
    pub fn sign(&self, hub: &ServiceHub) -> FlowResult<NotarisationRequestSignature> {
        let platform_version = hub.config.platform_version;
        let bytes = self.signable_bytes(platform_version)?;
        let digital_signature = hub.keys.sign(&bytes, &hub.legal_identity_key()?)?;
        Ok(NotarisationRequestSignature {
            digital_signature,
            platform_version,
        })
    }

    /// Check `signature` was made over this request by a key of `requester`.
    pub fn verify(&self, signature: &NotarisationRequestSignature, requester: &Party) -> NotaryResult<()> {
        let signer = &signature.digital_signature.by;
        if !requester.owning_key.contains(signer) {
            return Err(NotaryError::signature_invalid(format!(
                "signed by {signer}, which is not a key of {requester}"
            )));
        }
        let bytes = self
            .signable_bytes(signature.platform_version)
            .map_err(NotaryError::signature_invalid)?;
        signature
            .digital_signature
            .verify(&bytes)
            .map_err(NotaryError::signature_invalid)
    }
}

/// Requester's signature over a [`NotarisationRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarisationRequestSignature {
    pub digital_signature: DigitalSignatureWithKey,
    /// Platform version of the signer; part of the signed bytes.
    pub platform_version: u32,
}

/// The transaction as shown to the notary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotarisedTransaction {
    /// Full contents, for a validating notary.
    Full(Box<SignedTransaction>),
    /// Inputs, references, notary, time window and parameters only.
    Filtered(Box<FilteredTransaction>),
}

impl NotarisedTransaction {
    pub fn id(&self) -> SecureHash {
        match self {
            NotarisedTransaction::Full(stx) => stx.id(),
            NotarisedTransaction::Filtered(ftx) => ftx.id,
        }
    }
}

/// Requester to notary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarisationPayload {
    pub transaction: NotarisedTransaction,
    pub request_signature: NotarisationRequestSignature,
}

/// Notary signatures over the transaction id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarisationResponse {
    pub signatures: Vec<TransactionSignature>,
}

/// Notary to requester: signatures, or a signed refusal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotaryReply {
    Signed(NotarisationResponse),
    Refused(shared_types::SignedData<NotaryError>),
}
