//! # Identities and Keys
//!
//! A [`PublicKey`] is a single Ed25519 signing key. An [`OwningKey`] is what
//! a party or a command requires: either a single key or a weighted
//! threshold [`CompositeKey`] (used by notary clusters).

use crate::errors::SignatureError;
use serde::{Deserialize, Serialize};
use shared_crypto::{Ed25519PublicKey, Ed25519Signature};
use std::collections::BTreeSet;
use std::fmt;

/// A single Ed25519 signing key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verify `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SignatureError> {
        let key = Ed25519PublicKey::from_bytes(self.0)?;
        let sig = Ed25519Signature::from_slice(signature)?;
        key.verify(message, &sig)
            .map_err(|_| SignatureError::InvalidSignature { key: *self })
    }

    /// Short printable form.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl From<Ed25519PublicKey> for PublicKey {
    fn from(key: Ed25519PublicKey) -> Self {
        Self(*key.as_bytes())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.short())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

/// A leaf of a composite key with its weight.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeightedKey {
    pub weight: u32,
    pub key: PublicKey,
}

/// Threshold key: fulfilled when the summed weight of signing leaves reaches
/// `threshold`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeKey {
    threshold: u32,
    children: Vec<WeightedKey>,
}

impl CompositeKey {
    /// Build a composite key. Children are sorted and deduplicated so two
    /// keys built from the same leaves compare equal.
    pub fn new(threshold: u32, mut children: Vec<WeightedKey>) -> Result<Self, SignatureError> {
        children.sort();
        children.dedup_by(|a, b| a.key == b.key);
        let total: u64 = children.iter().map(|c| u64::from(c.weight)).sum();
        if children.is_empty() || threshold == 0 || u64::from(threshold) > total {
            return Err(SignatureError::InvalidCompositeKey {
                threshold,
                total_weight: total,
            });
        }
        Ok(Self {
            threshold,
            children,
        })
    }

    /// Convenience: `threshold`-of-n with unit weights.
    pub fn threshold_of(threshold: u32, keys: impl IntoIterator<Item = PublicKey>) -> Result<Self, SignatureError> {
        let children = keys
            .into_iter()
            .map(|key| WeightedKey { weight: 1, key })
            .collect();
        Self::new(threshold, children)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn children(&self) -> &[WeightedKey] {
        &self.children
    }

    fn is_fulfilled_by(&self, signers: &BTreeSet<PublicKey>) -> bool {
        let weight: u64 = self
            .children
            .iter()
            .filter(|c| signers.contains(&c.key))
            .map(|c| u64::from(c.weight))
            .sum();
        weight >= u64::from(self.threshold)
    }
}

/// The key a party owns or a command requires.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OwningKey {
    Single(PublicKey),
    Composite(CompositeKey),
}

impl OwningKey {
    /// All leaf signing keys.
    pub fn keys(&self) -> BTreeSet<PublicKey> {
        match self {
            OwningKey::Single(k) => BTreeSet::from([*k]),
            OwningKey::Composite(c) => c.children.iter().map(|w| w.key).collect(),
        }
    }

    /// Whether signatures by `signers` satisfy this key.
    pub fn is_fulfilled_by(&self, signers: &BTreeSet<PublicKey>) -> bool {
        match self {
            OwningKey::Single(k) => signers.contains(k),
            OwningKey::Composite(c) => c.is_fulfilled_by(signers),
        }
    }

    /// Whether `key` is one of the leaves.
    pub fn contains(&self, key: &PublicKey) -> bool {
        match self {
            OwningKey::Single(k) => k == key,
            OwningKey::Composite(c) => c.children.iter().any(|w| &w.key == key),
        }
    }
}

impl From<PublicKey> for OwningKey {
    fn from(key: PublicKey) -> Self {
        OwningKey::Single(key)
    }
}

impl From<CompositeKey> for OwningKey {
    fn from(key: CompositeKey) -> Self {
        OwningKey::Composite(key)
    }
}

impl fmt::Display for OwningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwningKey::Single(k) => write!(f, "{k}"),
            OwningKey::Composite(c) => {
                let leaves: Vec<String> = c.children.iter().map(|w| w.key.short()).collect();
                write!(f, "{}-of[{}]", c.threshold, leaves.join(","))
            }
        }
    }
}

/// A well-known legal identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub owning_key: OwningKey,
}

impl Party {
    pub fn new(name: impl Into<String>, owning_key: impl Into<OwningKey>) -> Self {
        Self {
            name: name.into(),
            owning_key: owning_key.into(),
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::Ed25519KeyPair;

    fn key(seed: u8) -> PublicKey {
        Ed25519KeyPair::from_seed([seed; 32]).public_key().into()
    }

    #[test]
    fn test_single_key_fulfilment() {
        let k = OwningKey::from(key(1));
        assert!(k.is_fulfilled_by(&BTreeSet::from([key(1)])));
        assert!(!k.is_fulfilled_by(&BTreeSet::from([key(2)])));
    }

    #[test]
    fn test_composite_threshold() {
        let composite = CompositeKey::threshold_of(2, [key(1), key(2), key(3)]).unwrap();
        let owning = OwningKey::from(composite);

        assert!(!owning.is_fulfilled_by(&BTreeSet::from([key(1)])));
        assert!(owning.is_fulfilled_by(&BTreeSet::from([key(1), key(3)])));
        assert!(owning.contains(&key(2)));
        assert_eq!(owning.keys().len(), 3);
    }

    #[test]
    fn test_composite_rejects_unreachable_threshold() {
        let result = CompositeKey::threshold_of(3, [key(1), key(2)]);
        assert!(matches!(
            result,
            Err(SignatureError::InvalidCompositeKey { threshold: 3, total_weight: 2 })
        ));
    }

    #[test]
    fn test_composite_is_order_independent() {
        let a = CompositeKey::threshold_of(1, [key(1), key(2)]).unwrap();
        let b = CompositeKey::threshold_of(1, [key(2), key(1)]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_verify_signature() {
        let pair = Ed25519KeyPair::from_seed([9; 32]);
        let pk = PublicKey::from(pair.public_key());
        let sig = pair.sign(b"msg");
        assert!(pk.verify(b"msg", sig.as_bytes()).is_ok());
        assert!(matches!(
            pk.verify(b"other", sig.as_bytes()),
            Err(SignatureError::InvalidSignature { .. })
        ));
    }
}
