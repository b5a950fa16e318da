//! Identity, key management and verification adapters.

use crate::error::{FlowError, FlowResult};
use crate::ports::{IdentityService, KeyManagementService, NetworkMapCache, TransactionVerifier};
use parking_lot::RwLock;
use shared_crypto::Ed25519KeyPair;
use shared_types::{DigitalSignatureWithKey, Party, PublicKey, SignedTransaction, TransactionState};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Identity service and network map over one shared table.
#[derive(Default)]
pub struct InMemoryDirectory {
    parties: RwLock<BTreeMap<String, Party>>,
    versions: RwLock<HashMap<String, u32>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityService for InMemoryDirectory {
    fn party_from_key(&self, key: &PublicKey) -> Option<Party> {
        self.parties
            .read()
            .values()
            .find(|p| p.owning_key.contains(key))
            .cloned()
    }

    fn well_known_party(&self, name: &str) -> Option<Party> {
        self.parties.read().get(name).cloned()
    }

    fn register(&self, party: Party) {
        self.parties.write().insert(party.name.clone(), party);
    }
}

impl NetworkMapCache for InMemoryDirectory {
    fn platform_version(&self, party: &Party) -> Option<u32> {
        self.versions.read().get(&party.name).copied()
    }

    fn register_node(&self, party: Party, platform_version: u32) {
        self.versions.write().insert(party.name.clone(), platform_version);
        self.register(party);
    }

    fn nodes(&self) -> Vec<Party> {
        let versions = self.versions.read();
        self.parties
            .read()
            .values()
            .filter(|p| versions.contains_key(&p.name))
            .cloned()
            .collect()
    }
}

/// Key pairs held in memory.
#[derive(Default)]
pub struct InMemoryKeyManagementService {
    keys: RwLock<HashMap<PublicKey, Ed25519KeyPair>>,
}

impl InMemoryKeyManagementService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `pair`; returns its public key.
    pub fn add(&self, pair: Ed25519KeyPair) -> PublicKey {
        let public = PublicKey::from(pair.public_key());
        self.keys.write().insert(public, pair);
        public
    }

    /// Generate and store a fresh key.
    pub fn fresh_key(&self) -> PublicKey {
        self.add(Ed25519KeyPair::generate())
    }
}

impl KeyManagementService for InMemoryKeyManagementService {
    fn keys(&self) -> BTreeSet<PublicKey> {
        self.keys.read().keys().copied().collect()
    }

    fn sign(&self, data: &[u8], key: &PublicKey) -> FlowResult<DigitalSignatureWithKey> {
        let keys = self.keys.read();
        let pair = keys
            .get(key)
            .ok_or_else(|| FlowError::Internal(format!("no private key for {key}")))?;
        Ok(DigitalSignatureWithKey::sign(pair, data))
    }
}

/// Accepts every transaction. Contract logic is out of scope here.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllVerifier;

impl TransactionVerifier for AcceptAllVerifier {
    fn verify(&self, _: &SignedTransaction, _: &[TransactionState], _: &[TransactionState]) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_resolves_parties_by_key_and_name() {
        let kms = InMemoryKeyManagementService::new();
        let key = kms.fresh_key();
        let alice = Party::new("Alice", key);

        let directory = InMemoryDirectory::new();
        directory.register_node(alice.clone(), 4);

        assert_eq!(directory.party_from_key(&key), Some(alice.clone()));
        assert_eq!(directory.well_known_party("Alice"), Some(alice.clone()));
        assert_eq!(directory.platform_version(&alice), Some(4));
        assert_eq!(directory.nodes(), vec![alice]);
    }

    #[test]
    fn test_signing_with_unknown_key_fails() {
        let kms = InMemoryKeyManagementService::new();
        let stranger = InMemoryKeyManagementService::new().fresh_key();
        assert!(kms.sign(b"data", &stranger).is_err());
    }

    #[test]
    fn test_signature_verifies_against_key() {
        let kms = InMemoryKeyManagementService::new();
        let key = kms.fresh_key();
        let sig = kms.sign(b"payload", &key).unwrap();
        assert_eq!(sig.by, key);
        assert!(sig.verify(b"payload").is_ok());
    }
}
