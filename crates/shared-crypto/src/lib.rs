//! # Shared Crypto
//!
//! Primitive collaborators used by the ledger finality stack.
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-256 | Transaction ids, attachment ids, conflict evidence |
//! | `signatures` | Ed25519 | Party and notary signing keys |
//!
//! Higher layers never touch `ed25519_dalek` directly; they go through
//! [`Ed25519KeyPair`] and [`Ed25519PublicKey`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod signatures;

pub use errors::CryptoError;
pub use hashing::{sha256, sha256_many, Sha256Hasher};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
