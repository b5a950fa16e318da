//! Ports layer
//!
//! The uniqueness provider is the notary's single source of truth for
//! double-spend prevention. Implementations must serialise commits so that
//! of two overlapping requests exactly one observes the states unconsumed.

use crate::domain::NotarisationRequestSignature;
use crate::error::NotaryResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::{Party, SecureHash, StateRef, TimeWindow};

/// One request to consume states.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub states: Vec<StateRef>,
    pub tx_id: SecureHash,
    pub caller: Party,
    pub request_signature: NotarisationRequestSignature,
    pub time_window: Option<TimeWindow>,
    /// Checked for consumption but not consumed.
    pub references: Vec<StateRef>,
}

/// A request as kept in the provider's audit log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestLogEntry {
    pub tx_id: SecureHash,
    pub requester: String,
    pub requested_at: DateTime<Utc>,
    pub accepted: bool,
}

#[async_trait]
pub trait UniquenessProvider: Send + Sync {
    /// Commit `request.states` as consumed by `request.tx_id`.
    ///
    /// Re-committing the same transaction succeeds. Fails with
    /// [`crate::NotaryError::Conflict`] naming every state consumed by a
    /// different transaction, or with
    /// [`crate::NotaryError::TimeWindowInvalid`].
    async fn commit(&self, request: CommitRequest) -> NotaryResult<()>;

    /// The transaction that consumed `state`, if any.
    fn consumed_by(&self, state: &StateRef) -> Option<SecureHash>;

    /// Every request seen, oldest first.
    fn request_log(&self) -> Vec<RequestLogEntry>;
}
