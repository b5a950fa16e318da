//! # Core Ledger Entities
//!
//! Only what the finality protocols need to reference: states are opaque
//! payloads with participants, commands are named signer requirements.

use crate::errors::EncodingError;
use crate::hash::SecureHash;
use crate::identity::{OwningKey, Party};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pointer to an output of a previous transaction.
///
/// Field order matters: the derived ordering sorts by originating
/// transaction hash first, then output index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateRef {
    pub txhash: SecureHash,
    pub index: u32,
}

impl StateRef {
    pub fn new(txhash: SecureHash, index: u32) -> Self {
        Self { txhash, index }
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.txhash, self.index)
    }
}

impl fmt::Debug for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateRef({:?}, {})", self.txhash, self.index)
    }
}

/// Opaque contract state: the parties that must learn about it plus payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    pub participants: Vec<Party>,
    pub data: Vec<u8>,
}

/// A state together with the contract that governs it and its notary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionState {
    pub data: ContractState,
    pub contract: String,
    pub notary: Party,
}

impl TransactionState {
    pub fn new(data: ContractState, contract: impl Into<String>, notary: Party) -> Self {
        Self {
            data,
            contract: contract.into(),
            notary,
        }
    }

    /// Same state under a different notary.
    pub fn with_notary(&self, notary: Party) -> Self {
        Self {
            notary,
            ..self.clone()
        }
    }
}

/// A resolved state and where it lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef {
    pub state: TransactionState,
    pub state_ref: StateRef,
}

/// A named command with the keys that must sign for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub signers: Vec<OwningKey>,
}

impl Command {
    pub fn new(name: impl Into<String>, signers: Vec<OwningKey>) -> Self {
        Self {
            name: name.into(),
            signers,
        }
    }
}

/// Interval during which a transaction may be notarised. Either end may be
/// open; `from` is inclusive, `until` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn between(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            until: Some(until),
        }
    }

    pub fn from_only(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            until: None,
        }
    }

    pub fn until_only(until: DateTime<Utc>) -> Self {
        Self {
            from: None,
            until: Some(until),
        }
    }

    /// Window of `tolerance` either side of `time`.
    pub fn with_tolerance(time: DateTime<Utc>, tolerance: Duration) -> Self {
        Self::between(time - tolerance, time + tolerance)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let after_start = self.from.map_or(true, |from| instant >= from);
        let before_end = self.until.map_or(true, |until| instant < until);
        after_start && before_end
    }
}

/// Attachment content. The id is the SHA-256 of the bytes and is never
/// stored separately.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn id(&self) -> SecureHash {
        SecureHash::sha256(&self.data)
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("id", &self.id())
            .field("len", &self.data.len())
            .finish()
    }
}

/// A notary advertised in the network parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotaryInfo {
    pub identity: Party,
    pub validating: bool,
}

/// Network-wide parameters every transaction is bound to by hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParameters {
    pub minimum_platform_version: u32,
    pub notaries: Vec<NotaryInfo>,
    pub max_transaction_size: u32,
    pub epoch: u32,
}

impl NetworkParameters {
    pub fn hash(&self) -> Result<SecureHash, EncodingError> {
        SecureHash::of(self)
    }

    pub fn notary_info(&self, party: &Party) -> Option<&NotaryInfo> {
        self.notaries.iter().find(|n| &n.identity == party)
    }
}
