//! # Signatures
//!
//! | Type | Signs over |
//! |------|------------|
//! | [`DigitalSignatureWithKey`] | Arbitrary bytes |
//! | [`TransactionSignature`] | `encode((tx_id, metadata))` |
//! | [`SignedData<T>`] | `encode(value)`; the value is decoded only after the signature checks out |

use crate::encoding;
use crate::errors::{EncodingError, SignatureError};
use crate::hash::SecureHash;
use crate::identity::PublicKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_crypto::Ed25519KeyPair;
use std::fmt;
use std::marker::PhantomData;

/// Raw signature bytes together with the key that produced them.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DigitalSignatureWithKey {
    pub by: PublicKey,
    pub bytes: Vec<u8>,
}

impl DigitalSignatureWithKey {
    pub fn sign(key: &Ed25519KeyPair, message: &[u8]) -> Self {
        Self {
            by: key.public_key().into(),
            bytes: key.sign(message).as_bytes().to_vec(),
        }
    }

    pub fn verify(&self, message: &[u8]) -> Result<(), SignatureError> {
        self.by.verify(message, &self.bytes)
    }
}

impl fmt::Debug for DigitalSignatureWithKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DigitalSignatureWithKey(by={})", self.by)
    }
}

/// Extra data bound into every transaction signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureMetadata {
    pub platform_version: u32,
    pub scheme_number_id: u32,
}

impl SignatureMetadata {
    /// Ed25519 scheme identifier.
    pub const ED25519: u32 = 4;

    pub fn new(platform_version: u32) -> Self {
        Self {
            platform_version,
            scheme_number_id: Self::ED25519,
        }
    }
}

/// A signature over a transaction id.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub bytes: Vec<u8>,
    pub by: PublicKey,
    pub metadata: SignatureMetadata,
}

impl TransactionSignature {
    fn signable(tx_id: &SecureHash, metadata: &SignatureMetadata) -> Result<Vec<u8>, EncodingError> {
        encoding::encode(&(tx_id, metadata))
    }

    pub fn sign(
        key: &Ed25519KeyPair,
        tx_id: &SecureHash,
        metadata: SignatureMetadata,
    ) -> Result<Self, EncodingError> {
        let message = Self::signable(tx_id, &metadata)?;
        Ok(Self {
            bytes: key.sign(&message).as_bytes().to_vec(),
            by: key.public_key().into(),
            metadata,
        })
    }

    /// Build from a signature produced elsewhere (e.g. by a key manager).
    pub fn from_parts(bytes: Vec<u8>, by: PublicKey, metadata: SignatureMetadata) -> Self {
        Self {
            bytes,
            by,
            metadata,
        }
    }

    /// Bytes a signer must sign to produce a signature over `tx_id`.
    pub fn signable_bytes(tx_id: &SecureHash, metadata: &SignatureMetadata) -> Result<Vec<u8>, EncodingError> {
        Self::signable(tx_id, metadata)
    }

    pub fn verify(&self, tx_id: &SecureHash) -> Result<(), SignatureError> {
        let message = Self::signable(tx_id, &self.metadata)?;
        self.by.verify(&message, &self.bytes)
    }
}

impl fmt::Debug for TransactionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransactionSignature(by={}, pv={})",
            self.by, self.metadata.platform_version
        )
    }
}

/// A value serialised and signed as a unit.
///
/// The payload is only deserialised by [`SignedData::verified`] after the
/// signature over the raw bytes has been checked.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedData<T> {
    pub raw: Vec<u8>,
    pub sig: DigitalSignatureWithKey,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> SignedData<T> {
    pub fn sign(key: &Ed25519KeyPair, value: &T) -> Result<Self, EncodingError> {
        let raw = encoding::encode(value)?;
        let sig = DigitalSignatureWithKey::sign(key, &raw);
        Ok(Self {
            raw,
            sig,
            _marker: PhantomData,
        })
    }

    pub fn from_parts(raw: Vec<u8>, sig: DigitalSignatureWithKey) -> Self {
        Self {
            raw,
            sig,
            _marker: PhantomData,
        }
    }

    /// Check the signature, then decode.
    pub fn verified(&self) -> Result<T, SignatureError> {
        self.sig.verify(&self.raw)?;
        Ok(encoding::decode(&self.raw)?)
    }
}

impl<T> fmt::Debug for SignedData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignedData(len={}, by={})", self.raw.len(), self.sig.by)
    }
}
