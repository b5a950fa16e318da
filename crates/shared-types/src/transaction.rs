//! # Transactions
//!
//! ## Identity
//!
//! A transaction is a fixed list of component groups. Each group is hashed
//! with its own nonce derived from the privacy salt, and the id is the hash
//! of the concatenated group hashes:
//!
//! ```text
//! nonce(g)  = sha256(salt || g)
//! hash(g)   = sha256(nonce(g) || encode(group g))
//! id        = sha256(hash(0) || hash(1) || ... || hash(7))
//! ```
//!
//! Revealing a group therefore means revealing its bytes and nonce, and
//! hiding it means publishing only its hash. [`FilteredTransaction`] is built
//! on exactly that.

use crate::encoding;
use crate::entities::{Command, StateAndRef, StateRef, TimeWindow, TransactionState};
use crate::errors::{
    EncodingError, FilteredTransactionVerificationError, SignatureError, TransactionBuildError,
};
use crate::hash::SecureHash;
use crate::identity::{OwningKey, Party, PublicKey};
use crate::signatures::TransactionSignature;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_crypto::Sha256Hasher;
use std::collections::BTreeSet;

/// Component groups in id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentGroup {
    Inputs = 0,
    Outputs = 1,
    Commands = 2,
    Attachments = 3,
    Notary = 4,
    TimeWindow = 5,
    References = 6,
    Parameters = 7,
}

impl ComponentGroup {
    pub const ALL: [ComponentGroup; 8] = [
        ComponentGroup::Inputs,
        ComponentGroup::Outputs,
        ComponentGroup::Commands,
        ComponentGroup::Attachments,
        ComponentGroup::Notary,
        ComponentGroup::TimeWindow,
        ComponentGroup::References,
        ComponentGroup::Parameters,
    ];

    /// Groups a notary needs to see.
    pub const NOTARY_VIEW: [ComponentGroup; 5] = [
        ComponentGroup::Inputs,
        ComponentGroup::Notary,
        ComponentGroup::TimeWindow,
        ComponentGroup::References,
        ComponentGroup::Parameters,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    fn nonce(self, salt: &SecureHash) -> SecureHash {
        let mut hasher = Sha256Hasher::new();
        hasher.update(salt.as_bytes()).update(&(self as u32).to_le_bytes());
        SecureHash(hasher.finalize())
    }
}

fn component_hash(nonce: &SecureHash, bytes: &[u8]) -> SecureHash {
    let mut hasher = Sha256Hasher::new();
    hasher.update(nonce.as_bytes()).update(bytes);
    SecureHash(hasher.finalize())
}

fn merkle_id(group_hashes: &[SecureHash]) -> SecureHash {
    let mut hasher = Sha256Hasher::new();
    for h in group_hashes {
        hasher.update(h.as_bytes());
    }
    SecureHash(hasher.finalize())
}

// =============================================================================
// WIRE TRANSACTION
// =============================================================================

/// Serialised form of [`WireTransaction`]. The id is not part of it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct WireComponents {
    inputs: Vec<StateRef>,
    outputs: Vec<TransactionState>,
    commands: Vec<Command>,
    attachments: Vec<SecureHash>,
    notary: Option<Party>,
    time_window: Option<TimeWindow>,
    references: Vec<StateRef>,
    network_parameters_hash: Option<SecureHash>,
    privacy_salt: SecureHash,
}

impl WireComponents {
    fn group_bytes(&self, group: ComponentGroup) -> Result<Vec<u8>, EncodingError> {
        match group {
            ComponentGroup::Inputs => encoding::encode(&self.inputs),
            ComponentGroup::Outputs => encoding::encode(&self.outputs),
            ComponentGroup::Commands => encoding::encode(&self.commands),
            ComponentGroup::Attachments => encoding::encode(&self.attachments),
            ComponentGroup::Notary => encoding::encode(&self.notary),
            ComponentGroup::TimeWindow => encoding::encode(&self.time_window),
            ComponentGroup::References => encoding::encode(&self.references),
            ComponentGroup::Parameters => encoding::encode(&self.network_parameters_hash),
        }
    }

    fn group_hashes(&self) -> Result<Vec<SecureHash>, EncodingError> {
        ComponentGroup::ALL
            .iter()
            .map(|g| Ok(component_hash(&g.nonce(&self.privacy_salt), &self.group_bytes(*g)?)))
            .collect()
    }
}

/// An unsigned transaction. Immutable; the id is derived on construction and
/// on every deserialisation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireComponents", into = "WireComponents")]
pub struct WireTransaction {
    components: WireComponents,
    id: SecureHash,
}

impl TryFrom<WireComponents> for WireTransaction {
    type Error = EncodingError;

    fn try_from(components: WireComponents) -> Result<Self, Self::Error> {
        let id = merkle_id(&components.group_hashes()?);
        Ok(Self { components, id })
    }
}

impl From<WireTransaction> for WireComponents {
    fn from(tx: WireTransaction) -> Self {
        tx.components
    }
}

impl WireTransaction {
    pub fn id(&self) -> SecureHash {
        self.id
    }

    pub fn inputs(&self) -> &[StateRef] {
        &self.components.inputs
    }

    pub fn outputs(&self) -> &[TransactionState] {
        &self.components.outputs
    }

    pub fn commands(&self) -> &[Command] {
        &self.components.commands
    }

    pub fn attachments(&self) -> &[SecureHash] {
        &self.components.attachments
    }

    pub fn notary(&self) -> Option<&Party> {
        self.components.notary.as_ref()
    }

    pub fn time_window(&self) -> Option<&TimeWindow> {
        self.components.time_window.as_ref()
    }

    pub fn references(&self) -> &[StateRef] {
        &self.components.references
    }

    pub fn network_parameters_hash(&self) -> Option<SecureHash> {
        self.components.network_parameters_hash
    }

    pub fn privacy_salt(&self) -> SecureHash {
        self.components.privacy_salt
    }

    /// Whether a notary must sign: the transaction consumes or references
    /// states, or carries a time window.
    pub fn needs_notary_signature(&self) -> bool {
        !self.components.inputs.is_empty()
            || !self.components.references.is_empty()
            || self.components.time_window.is_some()
    }

    /// Command signers, plus the notary when one must sign.
    pub fn required_signing_keys(&self) -> BTreeSet<OwningKey> {
        let mut keys: BTreeSet<OwningKey> = self
            .components
            .commands
            .iter()
            .flat_map(|c| c.signers.iter().cloned())
            .collect();
        if self.needs_notary_signature() {
            if let Some(notary) = &self.components.notary {
                keys.insert(notary.owning_key.clone());
            }
        }
        keys
    }

    /// Hashes of the transactions whose outputs this one consumes or references.
    pub fn dependencies(&self) -> BTreeSet<SecureHash> {
        self.components
            .inputs
            .iter()
            .chain(self.components.references.iter())
            .map(|r| r.txhash)
            .collect()
    }

    pub fn out_ref(&self, index: u32) -> Option<StateAndRef> {
        self.components
            .outputs
            .get(index as usize)
            .map(|state| StateAndRef {
                state: state.clone(),
                state_ref: StateRef::new(self.id, index),
            })
    }

    pub fn out_refs(&self) -> Vec<StateAndRef> {
        (0..self.components.outputs.len() as u32)
            .filter_map(|i| self.out_ref(i))
            .collect()
    }

    /// Every party that participates in an output state.
    pub fn output_participants(&self) -> BTreeSet<Party> {
        self.components
            .outputs
            .iter()
            .flat_map(|o| o.data.participants.iter().cloned())
            .collect()
    }

    /// Reveal only `groups`, publishing the hashes of the rest.
    pub fn filter(&self, groups: &[ComponentGroup]) -> Result<FilteredTransaction, EncodingError> {
        let group_hashes = self.components.group_hashes()?;
        let mut revealed = Vec::new();
        for group in ComponentGroup::ALL.iter().filter(|g| groups.contains(g)) {
            revealed.push(FilteredComponent {
                group: *group,
                nonce: group.nonce(&self.components.privacy_salt),
                bytes: self.components.group_bytes(*group)?,
            });
        }
        Ok(FilteredTransaction {
            id: self.id,
            group_hashes,
            revealed,
        })
    }

    /// The view handed to a non-validating notary.
    pub fn filter_for_notary(&self) -> Result<FilteredTransaction, EncodingError> {
        self.filter(&ComponentGroup::NOTARY_VIEW)
    }

    /// Canonical size used against the network's maximum transaction size.
    pub fn encoded_size(&self) -> Result<usize, EncodingError> {
        Ok(encoding::encode(self)?.len())
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Assembles a [`WireTransaction`].
///
/// Without an explicit salt, the salt is derived from the content so that
/// building the same transaction twice gives the same id.
#[derive(Clone, Debug, Default)]
pub struct TransactionBuilder {
    notary: Option<Party>,
    input_notaries: Vec<Party>,
    inputs: Vec<StateRef>,
    outputs: Vec<TransactionState>,
    commands: Vec<Command>,
    attachments: Vec<SecureHash>,
    time_window: Option<TimeWindow>,
    references: Vec<StateRef>,
    network_parameters_hash: Option<SecureHash>,
    privacy_salt: Option<SecureHash>,
}

impl TransactionBuilder {
    pub fn new(notary: Option<Party>) -> Self {
        Self {
            notary,
            ..Default::default()
        }
    }

    pub fn add_input(mut self, state_ref: StateRef) -> Self {
        self.inputs.push(state_ref);
        self
    }

    /// Add an input and remember its notary for the consistency check.
    pub fn add_input_state(mut self, state: &StateAndRef) -> Self {
        if self.notary.is_none() {
            self.notary = Some(state.state.notary.clone());
        }
        self.input_notaries.push(state.state.notary.clone());
        self.inputs.push(state.state_ref);
        self
    }

    pub fn add_output(mut self, state: TransactionState) -> Self {
        self.outputs.push(state);
        self
    }

    pub fn add_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn add_attachment(mut self, id: SecureHash) -> Self {
        self.attachments.push(id);
        self
    }

    pub fn add_reference(mut self, state_ref: StateRef) -> Self {
        self.references.push(state_ref);
        self
    }

    pub fn time_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    pub fn network_parameters(mut self, hash: SecureHash) -> Self {
        self.network_parameters_hash = Some(hash);
        self
    }

    pub fn privacy_salt(mut self, salt: SecureHash) -> Self {
        self.privacy_salt = Some(salt);
        self
    }

    pub fn build(self) -> Result<WireTransaction, TransactionBuildError> {
        let needs_notary =
            !self.inputs.is_empty() || !self.references.is_empty() || self.time_window.is_some();
        if needs_notary && self.notary.is_none() {
            return Err(TransactionBuildError::NotaryMissing);
        }
        if let Some(notary) = &self.notary {
            if let Some(other) = self.input_notaries.iter().find(|n| *n != notary) {
                return Err(TransactionBuildError::MixedNotaries {
                    first: notary.name.clone(),
                    second: other.name.clone(),
                });
            }
        }
        let mut seen = BTreeSet::new();
        for input in &self.inputs {
            if !seen.insert(*input) {
                return Err(TransactionBuildError::DuplicateInput(input.to_string()));
            }
        }

        let mut components = WireComponents {
            inputs: self.inputs,
            outputs: self.outputs,
            commands: self.commands,
            attachments: self.attachments,
            notary: self.notary,
            time_window: self.time_window,
            references: self.references,
            network_parameters_hash: self.network_parameters_hash,
            privacy_salt: SecureHash::zero(),
        };
        components.privacy_salt = match self.privacy_salt {
            Some(salt) => salt,
            None => SecureHash::of(&components)?,
        };
        Ok(WireTransaction::try_from(components)?)
    }
}

// =============================================================================
// FILTERED TRANSACTION
// =============================================================================

/// A revealed component group with the nonce that hashes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredComponent {
    pub group: ComponentGroup,
    pub nonce: SecureHash,
    pub bytes: Vec<u8>,
}

/// A transaction with some component groups hidden.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredTransaction {
    pub id: SecureHash,
    pub group_hashes: Vec<SecureHash>,
    pub revealed: Vec<FilteredComponent>,
}

impl FilteredTransaction {
    /// Check that the group hashes combine to `id` and every revealed group
    /// matches its hash.
    pub fn verify(&self) -> Result<(), FilteredTransactionVerificationError> {
        if self.group_hashes.len() != ComponentGroup::ALL.len() {
            return Err(FilteredTransactionVerificationError::WrongGroupCount {
                id: self.id,
                expected: ComponentGroup::ALL.len(),
                got: self.group_hashes.len(),
            });
        }
        if merkle_id(&self.group_hashes) != self.id {
            return Err(FilteredTransactionVerificationError::IdMismatch { id: self.id });
        }
        for component in &self.revealed {
            let expected = self.group_hashes[component.group.index()];
            if component_hash(&component.nonce, &component.bytes) != expected {
                return Err(FilteredTransactionVerificationError::ComponentMismatch {
                    id: self.id,
                    group: component.group,
                });
            }
        }
        Ok(())
    }

    fn group<T: DeserializeOwned>(
        &self,
        group: ComponentGroup,
    ) -> Result<T, FilteredTransactionVerificationError> {
        let component = self
            .revealed
            .iter()
            .find(|c| c.group == group)
            .ok_or(FilteredTransactionVerificationError::ComponentNotVisible { id: self.id, group })?;
        Ok(encoding::decode(&component.bytes)?)
    }

    pub fn inputs(&self) -> Result<Vec<StateRef>, FilteredTransactionVerificationError> {
        self.group(ComponentGroup::Inputs)
    }

    pub fn references(&self) -> Result<Vec<StateRef>, FilteredTransactionVerificationError> {
        self.group(ComponentGroup::References)
    }

    pub fn notary(&self) -> Result<Option<Party>, FilteredTransactionVerificationError> {
        self.group(ComponentGroup::Notary)
    }

    pub fn time_window(&self) -> Result<Option<TimeWindow>, FilteredTransactionVerificationError> {
        self.group(ComponentGroup::TimeWindow)
    }

    pub fn network_parameters_hash(
        &self,
    ) -> Result<Option<SecureHash>, FilteredTransactionVerificationError> {
        self.group(ComponentGroup::Parameters)
    }
}

// =============================================================================
// SIGNED TRANSACTION
// =============================================================================

/// A transaction plus the signatures collected over its id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: WireTransaction,
    pub sigs: Vec<TransactionSignature>,
}

impl SignedTransaction {
    pub fn new(tx: WireTransaction, sigs: Vec<TransactionSignature>) -> Self {
        Self { tx, sigs }
    }

    pub fn id(&self) -> SecureHash {
        self.tx.id()
    }

    pub fn inputs(&self) -> &[StateRef] {
        self.tx.inputs()
    }

    pub fn references(&self) -> &[StateRef] {
        self.tx.references()
    }

    pub fn notary(&self) -> Option<&Party> {
        self.tx.notary()
    }

    pub fn dependencies(&self) -> BTreeSet<SecureHash> {
        self.tx.dependencies()
    }

    pub fn required_signing_keys(&self) -> BTreeSet<OwningKey> {
        self.tx.required_signing_keys()
    }

    /// Keys that produced a signature, valid or not.
    pub fn signers(&self) -> BTreeSet<PublicKey> {
        self.sigs.iter().map(|s| s.by).collect()
    }

    pub fn is_signed_by(&self, key: &OwningKey) -> bool {
        key.is_fulfilled_by(&self.signers())
    }

    /// Add a signature, ignoring one already present from the same key.
    pub fn with_additional_signature(&self, sig: TransactionSignature) -> Self {
        self.with_additional_signatures(std::iter::once(sig))
    }

    pub fn with_additional_signatures(&self, sigs: impl IntoIterator<Item = TransactionSignature>) -> Self {
        let mut out = self.clone();
        for sig in sigs {
            if !out.sigs.iter().any(|s| s.by == sig.by) {
                out.sigs.push(sig);
            }
        }
        out
    }

    /// Every attached signature must verify over the id.
    pub fn check_signatures_are_valid(&self) -> Result<(), SignatureError> {
        let id = self.id();
        self.sigs.iter().try_for_each(|s| s.verify(&id))
    }

    /// Required keys not yet fulfilled by the attached signatures.
    pub fn missing_signing_keys(&self) -> BTreeSet<OwningKey> {
        let signers = self.signers();
        self.required_signing_keys()
            .into_iter()
            .filter(|k| !k.is_fulfilled_by(&signers))
            .collect()
    }

    /// Check every signature is valid and every required key has signed,
    /// apart from those in `allowed_missing`.
    pub fn verify_signatures_except(&self, allowed_missing: &[OwningKey]) -> Result<(), SignatureError> {
        self.check_signatures_are_valid()?;
        let missing: Vec<OwningKey> = self
            .missing_signing_keys()
            .into_iter()
            .filter(|k| !allowed_missing.contains(k))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SignatureError::SignaturesMissing {
                tx_id: self.id(),
                missing,
            })
        }
    }

    pub fn verify_required_signatures(&self) -> Result<(), SignatureError> {
        self.verify_signatures_except(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ContractState;
    use crate::signatures::SignatureMetadata;
    use proptest::prelude::*;
    use shared_crypto::Ed25519KeyPair;

    fn keypair(seed: u8) -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed([seed; 32])
    }

    fn party(name: &str, seed: u8) -> Party {
        Party::new(name, PublicKey::from(keypair(seed).public_key()))
    }

    fn state(owner: &Party, notary: &Party, data: &[u8]) -> TransactionState {
        TransactionState::new(
            ContractState {
                participants: vec![owner.clone()],
                data: data.to_vec(),
            },
            "test.Contract",
            notary.clone(),
        )
    }

    fn spend_tx() -> (WireTransaction, Party, Party) {
        let alice = party("Alice", 1);
        let notary = party("Notary", 9);
        let tx = TransactionBuilder::new(Some(notary.clone()))
            .add_input(StateRef::new(SecureHash::sha256(b"prev"), 0))
            .add_output(state(&alice, &notary, b"out"))
            .add_command(Command::new("Move", vec![alice.owning_key.clone()]))
            .build()
            .unwrap();
        (tx, alice, notary)
    }

    // ===== ID DERIVATION =====

    #[test]
    fn test_id_is_recomputed_on_decode() {
        let (tx, _, _) = spend_tx();
        let bytes = encoding::encode(&tx).unwrap();
        let decoded: WireTransaction = encoding::decode(&bytes).unwrap();
        assert_eq!(decoded.id(), tx.id());
    }

    #[test]
    fn test_builder_is_deterministic() {
        let (a, _, _) = spend_tx();
        let (b, _, _) = spend_tx();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_salt_changes_id() {
        let alice = party("Alice", 1);
        let notary = party("Notary", 9);
        let base = TransactionBuilder::new(Some(notary.clone())).add_output(state(&alice, &notary, b"x"));
        let a = base.clone().privacy_salt(SecureHash::sha256(b"1")).build().unwrap();
        let b = base.privacy_salt(SecureHash::sha256(b"2")).build().unwrap();
        assert_ne!(a.id(), b.id());
    }

    // ===== BUILDER CHECKS =====

    #[test]
    fn test_inputs_without_notary_rejected() {
        let result = TransactionBuilder::new(None)
            .add_input(StateRef::new(SecureHash::zero(), 0))
            .build();
        assert_eq!(result, Err(TransactionBuildError::NotaryMissing));
    }

    #[test]
    fn test_duplicate_input_rejected() {
        let r = StateRef::new(SecureHash::zero(), 0);
        let result = TransactionBuilder::new(Some(party("N", 9)))
            .add_input(r)
            .add_input(r)
            .build();
        assert!(matches!(result, Err(TransactionBuildError::DuplicateInput(_))));
    }

    #[test]
    fn test_mixed_input_notaries_rejected() {
        let alice = party("Alice", 1);
        let n1 = party("N1", 8);
        let n2 = party("N2", 9);
        let s1 = StateAndRef {
            state: state(&alice, &n1, b"a"),
            state_ref: StateRef::new(SecureHash::sha256(b"a"), 0),
        };
        let s2 = StateAndRef {
            state: state(&alice, &n2, b"b"),
            state_ref: StateRef::new(SecureHash::sha256(b"b"), 0),
        };
        let result = TransactionBuilder::new(None)
            .add_input_state(&s1)
            .add_input_state(&s2)
            .build();
        assert!(matches!(result, Err(TransactionBuildError::MixedNotaries { .. })));
    }

    // ===== SIGNING KEYS =====

    #[test]
    fn test_notary_required_only_with_inputs() {
        let (tx, alice, notary) = spend_tx();
        let keys = tx.required_signing_keys();
        assert!(keys.contains(&alice.owning_key));
        assert!(keys.contains(&notary.owning_key));

        let issue = TransactionBuilder::new(Some(notary.clone()))
            .add_output(state(&alice, &notary, b"issue"))
            .add_command(Command::new("Issue", vec![alice.owning_key.clone()]))
            .build()
            .unwrap();
        assert!(!issue.needs_notary_signature());
        assert!(!issue.required_signing_keys().contains(&notary.owning_key));
    }

    #[test]
    fn test_verify_signatures_except_notary() {
        let (tx, _alice, notary) = spend_tx();
        let sig = TransactionSignature::sign(&keypair(1), &tx.id(), SignatureMetadata::new(4)).unwrap();
        let stx = SignedTransaction::new(tx, vec![sig]);

        assert!(matches!(
            stx.verify_required_signatures(),
            Err(SignatureError::SignaturesMissing { .. })
        ));
        assert!(stx.verify_signatures_except(&[notary.owning_key.clone()]).is_ok());

        let notary_sig =
            TransactionSignature::sign(&keypair(9), &stx.id(), SignatureMetadata::new(4)).unwrap();
        let complete = stx.with_additional_signature(notary_sig.clone());
        assert!(complete.verify_required_signatures().is_ok());
        assert_eq!(complete.with_additional_signature(notary_sig).sigs.len(), 2);
    }

    #[test]
    fn test_invalid_signature_detected() {
        let (tx, _, notary) = spend_tx();
        let wrong = TransactionSignature::sign(&keypair(1), &SecureHash::sha256(b"other"), SignatureMetadata::new(4))
            .unwrap();
        let stx = SignedTransaction::new(tx, vec![wrong]);
        assert!(matches!(
            stx.verify_signatures_except(&[notary.owning_key]),
            Err(SignatureError::InvalidSignature { .. })
        ));
    }

    // ===== FILTERED VIEW =====

    #[test]
    fn test_notary_filter_verifies_and_hides_outputs() {
        let (tx, _, notary) = spend_tx();
        let ftx = tx.filter_for_notary().unwrap();
        assert!(ftx.verify().is_ok());
        assert_eq!(ftx.id, tx.id());
        assert_eq!(ftx.inputs().unwrap(), tx.inputs());
        assert_eq!(ftx.notary().unwrap(), Some(notary));
        assert!(ftx.revealed.iter().all(|c| c.group != ComponentGroup::Outputs));
    }

    #[test]
    fn test_filter_detects_tampered_inputs() {
        let (tx, _, _) = spend_tx();
        let mut ftx = tx.filter_for_notary().unwrap();
        let forged = vec![StateRef::new(SecureHash::sha256(b"forged"), 0)];
        ftx.revealed[0].bytes = encoding::encode(&forged).unwrap();
        assert!(matches!(
            ftx.verify(),
            Err(FilteredTransactionVerificationError::ComponentMismatch {
                group: ComponentGroup::Inputs,
                ..
            })
        ));
    }

    #[test]
    fn test_filter_detects_wrong_id() {
        let (tx, _, _) = spend_tx();
        let mut ftx = tx.filter_for_notary().unwrap();
        ftx.id = SecureHash::sha256(b"claimed");
        assert!(matches!(
            ftx.verify(),
            Err(FilteredTransactionVerificationError::IdMismatch { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_filtered_view_always_verifies(indexes in proptest::collection::btree_set(0u32..64, 0..8)) {
            let notary = party("Notary", 9);
            let mut builder = TransactionBuilder::new(Some(notary));
            for i in &indexes {
                builder = builder.add_input(StateRef::new(SecureHash::sha256(b"p"), *i));
            }
            let tx = builder.build().unwrap();
            let ftx = tx.filter_for_notary().unwrap();
            prop_assert!(ftx.verify().is_ok());
            prop_assert_eq!(ftx.inputs().unwrap(), tx.inputs().to_vec());
        }
    }
}
