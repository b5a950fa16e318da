//! Driven Ports (collaborators the engine and flows depend on)
//!
//! Storage engines, transport, identity and key management are outside this
//! crate. In-memory implementations live in [`crate::adapters`].

use crate::domain::{Checkpoint, RunId, SessionId, SessionMessage};
use crate::error::FlowResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{
    Attachment, DigitalSignatureWithKey, NetworkParameters, Party, PublicKey, SecureHash,
    SignatureMetadata, SignedTransaction, TransactionSignature, TransactionState,
};
use std::collections::BTreeSet;

/// Transport for session messages.
///
/// Delivery into a session is ordered by sequence number and idempotent:
/// a message at or below the acknowledged sequence is dropped.
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Hand a message to the transport for `to`.
    async fn send(&self, to: &Party, message: SessionMessage) -> FlowResult<()>;

    /// Wait for the message with sequence `seq` on our side `session`.
    async fn receive(&self, session: SessionId, seq: u64) -> FlowResult<SessionMessage>;

    /// Messages up to and including `seq` have been durably processed.
    fn acknowledge(&self, session: SessionId, seq: u64);

    /// Wait for the next session opened by a counterparty. Returns the
    /// `Init` message; it stays pending until acknowledged.
    async fn next_session_init(&self) -> SessionMessage;
}

/// Durable store for flow checkpoints.
pub trait CheckpointStorage: Send + Sync {
    fn put(&self, checkpoint: &Checkpoint) -> FlowResult<()>;
    fn get(&self, run_id: &RunId) -> FlowResult<Option<Checkpoint>>;
    fn remove(&self, run_id: &RunId) -> FlowResult<bool>;
    fn all(&self) -> FlowResult<Vec<Checkpoint>>;
}

/// Validated transactions plus a staging area for downloaded, not yet
/// verified ones.
#[async_trait]
pub trait TransactionStorage: Send + Sync {
    fn get(&self, id: &SecureHash) -> Option<SignedTransaction>;

    /// Record a verified transaction. Returns `true` if it was not already
    /// recorded; re-adding is a no-op.
    fn add(&self, stx: SignedTransaction) -> bool;

    fn add_unverified(&self, stx: SignedTransaction);

    fn get_unverified(&self, id: &SecureHash) -> Option<SignedTransaction>;

    /// Resolve once `id` is recorded.
    async fn wait_for_transaction(&self, id: &SecureHash) -> SignedTransaction;
}

/// Content-addressed attachment store.
pub trait AttachmentStorage: Send + Sync {
    fn get(&self, id: &SecureHash) -> Option<Attachment>;

    /// Import an attachment. Idempotent; returns its id.
    fn import(&self, attachment: Attachment) -> SecureHash;

    fn has(&self, id: &SecureHash) -> bool {
        self.get(id).is_some()
    }
}

/// Maps keys to well-known identities.
pub trait IdentityService: Send + Sync {
    /// The party owning `key`, directly or as a composite leaf.
    fn party_from_key(&self, key: &PublicKey) -> Option<Party>;

    fn well_known_party(&self, name: &str) -> Option<Party>;

    fn register(&self, party: Party);
}

/// Holds this node's private keys.
pub trait KeyManagementService: Send + Sync {
    fn keys(&self) -> BTreeSet<PublicKey>;

    fn sign(&self, data: &[u8], key: &PublicKey) -> FlowResult<DigitalSignatureWithKey>;

    fn filter_my_keys(&self, candidates: &BTreeSet<PublicKey>) -> BTreeSet<PublicKey> {
        self.keys().intersection(candidates).copied().collect()
    }

    fn sign_transaction(
        &self,
        tx_id: &SecureHash,
        key: &PublicKey,
        metadata: SignatureMetadata,
    ) -> FlowResult<TransactionSignature> {
        let bytes = TransactionSignature::signable_bytes(tx_id, &metadata)?;
        let sig = self.sign(&bytes, key)?;
        Ok(TransactionSignature::from_parts(sig.bytes, *key, metadata))
    }
}

/// Directory of nodes and their advertised platform versions.
pub trait NetworkMapCache: Send + Sync {
    fn platform_version(&self, party: &Party) -> Option<u32>;

    fn register_node(&self, party: Party, platform_version: u32);

    fn nodes(&self) -> Vec<Party>;
}

/// Network parameter sets by hash, plus the one currently in force.
pub trait NetworkParametersStorage: Send + Sync {
    fn get(&self, hash: &SecureHash) -> Option<NetworkParameters>;

    /// Store a parameter set; returns its hash.
    fn save(&self, parameters: NetworkParameters) -> FlowResult<SecureHash>;

    fn current_hash(&self) -> SecureHash;

    fn current(&self) -> NetworkParameters;
}

/// Contract verification hook. Contract execution is not part of this core;
/// the default accepts everything.
pub trait TransactionVerifier: Send + Sync {
    fn verify(
        &self,
        stx: &SignedTransaction,
        inputs: &[TransactionState],
        references: &[TransactionState],
    ) -> Result<(), String>;
}

/// Wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
