//! In-memory stores.

use crate::domain::{Checkpoint, RunId};
use crate::error::{FlowError, FlowResult};
use crate::ports::{AttachmentStorage, CheckpointStorage, NetworkParametersStorage, TransactionStorage};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::{encoding, Attachment, NetworkParameters, SecureHash, SignedTransaction};
use std::collections::HashMap;
use tokio::sync::Notify;

// =============================================================================
// CHECKPOINTS
// =============================================================================

/// Checkpoints kept in encoded form, so every put and get goes through the
/// same serialisation a durable store would.
#[derive(Default)]
pub struct InMemoryCheckpointStorage {
    entries: Mutex<HashMap<RunId, Vec<u8>>>,
}

impl InMemoryCheckpointStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CheckpointStorage for InMemoryCheckpointStorage {
    fn put(&self, checkpoint: &Checkpoint) -> FlowResult<()> {
        let bytes = encoding::encode(checkpoint)?;
        self.entries.lock().insert(checkpoint.run_id, bytes);
        Ok(())
    }

    fn get(&self, run_id: &RunId) -> FlowResult<Option<Checkpoint>> {
        match self.entries.lock().get(run_id) {
            Some(bytes) => Ok(Some(encoding::decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn remove(&self, run_id: &RunId) -> FlowResult<bool> {
        Ok(self.entries.lock().remove(run_id).is_some())
    }

    fn all(&self) -> FlowResult<Vec<Checkpoint>> {
        let entries = self.entries.lock();
        entries
            .values()
            .map(|bytes| encoding::decode(bytes).map_err(FlowError::from))
            .collect()
    }
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

#[derive(Default)]
pub struct InMemoryTransactionStorage {
    verified: RwLock<HashMap<SecureHash, SignedTransaction>>,
    unverified: RwLock<HashMap<SecureHash, SignedTransaction>>,
    recorded: Notify,
}

impl InMemoryTransactionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.verified.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.verified.read().is_empty()
    }
}

#[async_trait]
impl TransactionStorage for InMemoryTransactionStorage {
    fn get(&self, id: &SecureHash) -> Option<SignedTransaction> {
        self.verified.read().get(id).cloned()
    }

    fn add(&self, stx: SignedTransaction) -> bool {
        let id = stx.id();
        let added = {
            let mut verified = self.verified.write();
            if verified.contains_key(&id) {
                false
            } else {
                verified.insert(id, stx);
                true
            }
        };
        if added {
            self.unverified.write().remove(&id);
            self.recorded.notify_waiters();
        }
        added
    }

    fn add_unverified(&self, stx: SignedTransaction) {
        let id = stx.id();
        if !self.verified.read().contains_key(&id) {
            self.unverified.write().insert(id, stx);
        }
    }

    fn get_unverified(&self, id: &SecureHash) -> Option<SignedTransaction> {
        self.unverified.read().get(id).cloned()
    }

    async fn wait_for_transaction(&self, id: &SecureHash) -> SignedTransaction {
        loop {
            let notified = self.recorded.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(stx) = self.get(id) {
                return stx;
            }
            notified.await;
        }
    }
}

// =============================================================================
// ATTACHMENTS
// =============================================================================

#[derive(Default)]
pub struct InMemoryAttachmentStorage {
    attachments: RwLock<HashMap<SecureHash, Attachment>>,
}

impl InMemoryAttachmentStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttachmentStorage for InMemoryAttachmentStorage {
    fn get(&self, id: &SecureHash) -> Option<Attachment> {
        self.attachments.read().get(id).cloned()
    }

    fn import(&self, attachment: Attachment) -> SecureHash {
        let id = attachment.id();
        self.attachments.write().entry(id).or_insert(attachment);
        id
    }
}

// =============================================================================
// NETWORK PARAMETERS
// =============================================================================

pub struct InMemoryNetworkParametersStorage {
    by_hash: RwLock<HashMap<SecureHash, NetworkParameters>>,
    current: RwLock<(SecureHash, NetworkParameters)>,
}

impl InMemoryNetworkParametersStorage {
    pub fn new(current: NetworkParameters) -> FlowResult<Self> {
        let hash = current.hash()?;
        let mut by_hash = HashMap::new();
        by_hash.insert(hash, current.clone());
        Ok(Self {
            by_hash: RwLock::new(by_hash),
            current: RwLock::new((hash, current)),
        })
    }

    /// Save `parameters` and make them current.
    pub fn set_current(&self, parameters: NetworkParameters) -> FlowResult<SecureHash> {
        let hash = self.save(parameters.clone())?;
        *self.current.write() = (hash, parameters);
        Ok(hash)
    }
}

impl NetworkParametersStorage for InMemoryNetworkParametersStorage {
    fn get(&self, hash: &SecureHash) -> Option<NetworkParameters> {
        self.by_hash.read().get(hash).cloned()
    }

    fn save(&self, parameters: NetworkParameters) -> FlowResult<SecureHash> {
        let hash = parameters.hash()?;
        self.by_hash.write().insert(hash, parameters);
        Ok(hash)
    }

    fn current_hash(&self) -> SecureHash {
        self.current.read().0
    }

    fn current(&self) -> NetworkParameters {
        self.current.read().1.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FlowStart;
    use shared_crypto::Ed25519KeyPair;
    use shared_types::{Party, PublicKey, TransactionBuilder};
    use std::sync::Arc;
    use std::time::Duration;

    fn party(name: &str) -> Party {
        Party::new(name, PublicKey::from(Ed25519KeyPair::generate().public_key()))
    }

    fn signed_tx(notary: &Party) -> SignedTransaction {
        let tx = TransactionBuilder::new(Some(notary.clone()))
            .privacy_salt(SecureHash::sha256(b"storage-test"))
            .build()
            .unwrap();
        SignedTransaction::new(tx, vec![])
    }

    fn params() -> NetworkParameters {
        NetworkParameters {
            minimum_platform_version: 1,
            notaries: vec![],
            max_transaction_size: 1024,
            epoch: 1,
        }
    }

    // =========================================================================
    // CHECKPOINT TESTS
    // =========================================================================

    #[test]
    fn test_checkpoint_put_get_remove() {
        let store = InMemoryCheckpointStorage::new();
        let checkpoint = Checkpoint::new(
            RunId::random(),
            "flow",
            party("Alice"),
            FlowStart::Explicit {
                flow_name: "flow".into(),
                args: vec![1, 2, 3],
            },
        );

        store.put(&checkpoint).unwrap();
        assert_eq!(store.get(&checkpoint.run_id).unwrap(), Some(checkpoint.clone()));
        assert_eq!(store.all().unwrap().len(), 1);
        assert!(store.remove(&checkpoint.run_id).unwrap());
        assert!(!store.remove(&checkpoint.run_id).unwrap());
        assert!(store.is_empty());
    }

    // =========================================================================
    // TRANSACTION TESTS
    // =========================================================================

    #[test]
    fn test_add_is_idempotent_and_clears_staging() {
        let store = InMemoryTransactionStorage::new();
        let stx = signed_tx(&party("Notary"));

        store.add_unverified(stx.clone());
        assert!(store.get_unverified(&stx.id()).is_some());
        assert!(store.add(stx.clone()));
        assert!(!store.add(stx.clone()));
        assert!(store.get_unverified(&stx.id()).is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_transaction_wakes_on_add() {
        let store = Arc::new(InMemoryTransactionStorage::new());
        let stx = signed_tx(&party("Notary"));
        let id = stx.id();

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.wait_for_transaction(&id).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.add(stx.clone());

        let got = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, stx);
    }

    // =========================================================================
    // PARAMETER / ATTACHMENT TESTS
    // =========================================================================

    #[test]
    fn test_network_parameters_current_and_history() {
        let first = params();
        let store = InMemoryNetworkParametersStorage::new(first.clone()).unwrap();
        let first_hash = store.current_hash();

        let mut second = first.clone();
        second.epoch = 2;
        let second_hash = store.set_current(second.clone()).unwrap();

        assert_ne!(first_hash, second_hash);
        assert_eq!(store.current(), second);
        assert_eq!(store.get(&first_hash), Some(first));
    }

    #[test]
    fn test_attachment_import_is_content_addressed() {
        let store = InMemoryAttachmentStorage::new();
        let id = store.import(Attachment::new(b"jar".to_vec()));
        assert_eq!(id, SecureHash::sha256(b"jar"));
        assert!(store.has(&id));
    }
}
