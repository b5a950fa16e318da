//! # Secure Hash
//!
//! SHA-256 identifiers for transactions, attachments and network parameters.

use crate::encoding;
use crate::errors::EncodingError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte SHA-256 digest.
///
/// Ordering is bytewise, which gives [`crate::StateRef`] its canonical order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct SecureHash(pub [u8; 32]);

impl SecureHash {
    /// The all-zero hash.
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Hash raw bytes.
    pub fn sha256(data: &[u8]) -> Self {
        Self(shared_crypto::sha256(data))
    }

    /// Hash the canonical encoding of a value.
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Result<Self, EncodingError> {
        Ok(Self::sha256(&encoding::encode(value)?))
    }

    /// Hash of this hash. Used to publish a transaction's identity in conflict
    /// evidence without revealing the id itself.
    pub fn rehash(&self) -> Self {
        Self::sha256(&self.0)
    }

    /// Hash of the concatenation of `self` and `other`.
    pub fn concat(&self, other: &SecureHash) -> Self {
        Self(shared_crypto::sha256_many(&[&self.0, &other.0]))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn parse(s: &str) -> Result<Self, EncodingError> {
        let bytes = hex::decode(s).map_err(|e| EncodingError::Decode(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| EncodingError::Decode(format!("expected 32 bytes in {s}")))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex().to_uppercase())
    }
}

impl fmt::Debug for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureHash({}..)", &self.to_hex()[..12])
    }
}
