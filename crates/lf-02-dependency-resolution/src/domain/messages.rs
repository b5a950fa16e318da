//! Wire shapes exchanged between a requester and a vending peer.

use serde::{Deserialize, Serialize};
use shared_types::{SecureHash, SignedTransaction};
use std::fmt;

/// Kind of item a fetch request asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Transaction,
    Attachment,
    Parameters,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Transaction => write!(f, "transaction"),
            DataType::Attachment => write!(f, "attachment"),
            DataType::Parameters => write!(f, "network parameters"),
        }
    }
}

/// Requester to vendor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchRequest {
    /// Send these items, in this order. Never empty.
    Data { hashes: Vec<SecureHash>, data_type: DataType },
    /// No more requests on this session.
    End,
}

/// What the sending side opens with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendContent {
    Transaction(Box<SignedTransaction>),
    Hashes(Vec<SecureHash>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendPayload {
    pub content: SendContent,
    /// Caller-defined bytes carried alongside, opaque to resolution.
    pub extra_data: Option<Vec<u8>>,
}

impl SendPayload {
    /// Ids the receiver may request before asking for anything else.
    pub fn initially_authorised(&self) -> Vec<SecureHash> {
        match &self.content {
            SendContent::Transaction(stx) => {
                let mut ids: Vec<SecureHash> = stx.dependencies().into_iter().collect();
                ids.extend(stx.tx.attachments().iter().copied());
                ids.extend(stx.tx.network_parameters_hash());
                ids
            }
            SendContent::Hashes(hashes) => hashes.clone(),
        }
    }
}
