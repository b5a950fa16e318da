//! # Shared Types Crate
//!
//! Minimum ledger data model needed by the finality protocols. Contract
//! semantics are deliberately opaque: a state is a participant list plus
//! bytes, and a command is a name plus required signers.
//!
//! ## Design Principles
//!
//! - **Derived identifiers**: transaction and attachment ids are always
//!   recomputed from content. A deserialised [`WireTransaction`] never trusts
//!   an id supplied by the sender.
//! - **Canonical encoding**: every signed or hashed structure is encoded with
//!   bincode through [`encoding`], so the same value always produces the same
//!   bytes.
//! - **Filtered views**: [`FilteredTransaction`] reveals selected component
//!   groups together with the hashes of the hidden ones, which is enough to
//!   re-derive the transaction id.

pub mod encoding;
pub mod entities;
pub mod errors;
pub mod hash;
pub mod identity;
pub mod signatures;
pub mod transaction;

pub use entities::*;
pub use errors::*;
pub use hash::SecureHash;
pub use identity::{CompositeKey, OwningKey, Party, PublicKey, WeightedKey};
pub use signatures::{DigitalSignatureWithKey, SignatureMetadata, SignedData, TransactionSignature};
pub use transaction::{
    ComponentGroup, FilteredTransaction, SignedTransaction, TransactionBuilder, WireTransaction,
};

/// Platform version implemented by this crate set.
///
/// Counterparties advertise theirs through the network map; optional protocol
/// features are gated on it.
pub const PLATFORM_VERSION: u32 = 4;
