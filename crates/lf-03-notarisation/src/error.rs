//! Notary error taxonomy.
//!
//! A refused notarisation produces exactly one [`NotaryError`]. The notary
//! signs it before replying so the requester can show the refusal to third
//! parties.

use chrono::{DateTime, Utc};
use lf_01_task_engine::TransportableError;
use serde::{Deserialize, Serialize};
use shared_types::{SecureHash, SignedData, StateRef, TimeWindow};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// How a conflicting state was used by the transaction that got there first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumedStateType {
    InputState,
    ReferenceInputState,
}

/// Evidence about one already-consumed state.
///
/// Only the hash of the consuming transaction id is disclosed, so a
/// requester cannot use the notary to discover transaction ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConsumptionDetails {
    pub hash_of_transaction_id: SecureHash,
    pub kind: ConsumedStateType,
}

impl StateConsumptionDetails {
    pub fn consumed_by(tx_id: &SecureHash, kind: ConsumedStateType) -> Self {
        Self {
            hash_of_transaction_id: tx_id.rehash(),
            kind,
        }
    }
}

/// Why a notary refused to sign.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum NotaryError {
    /// One or more inputs or reference states were consumed by another
    /// transaction.
    #[error("Input state conflict for transaction {tx_id}: {} state(s) already consumed", consumed_states.len())]
    Conflict {
        tx_id: SecureHash,
        consumed_states: BTreeMap<StateRef, StateConsumptionDetails>,
    },

    #[error("Current time {current_time} is outside the transaction time window {}", DisplayWindow(tx_time_window))]
    TimeWindowInvalid {
        current_time: DateTime<Utc>,
        tx_time_window: TimeWindow,
    },

    #[error("Transaction invalid: {cause}")]
    TransactionInvalid { cause: String },

    #[error("Transaction is not assigned to this notary")]
    WrongNotary,

    #[error("Request signature invalid: {cause}")]
    RequestSignatureInvalid { cause: String },

    #[error("Notarisation failed: {cause}")]
    General { cause: String },
}

impl NotaryError {
    pub fn transaction_invalid(cause: impl fmt::Display) -> Self {
        NotaryError::TransactionInvalid {
            cause: cause.to_string(),
        }
    }

    pub fn signature_invalid(cause: impl fmt::Display) -> Self {
        NotaryError::RequestSignatureInvalid {
            cause: cause.to_string(),
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            NotaryError::Conflict { .. } => "conflict",
            NotaryError::TimeWindowInvalid { .. } => "time_window",
            NotaryError::TransactionInvalid { .. } => "transaction_invalid",
            NotaryError::WrongNotary => "wrong_notary",
            NotaryError::RequestSignatureInvalid { .. } => "request_signature",
            NotaryError::General { .. } => "general",
        }
    }
}

struct DisplayWindow<'a>(&'a TimeWindow);

impl fmt::Display for DisplayWindow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = self.0.from.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-inf".into());
        let until = self.0.until.map(|t| t.to_rfc3339()).unwrap_or_else(|| "+inf".into());
        write!(f, "[{from}, {until})")
    }
}

/// Notarisation of `tx_id` failed with `error`.
///
/// Travels across sessions, so a finality initiator's counterparties see
/// the same typed failure.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Unable to notarise transaction {tx_id}: {error}")]
pub struct NotaryException {
    pub tx_id: SecureHash,
    pub error: NotaryError,
    /// The refusal as signed by the notary, when the notary sent one.
    pub evidence: Option<SignedData<NotaryError>>,
}

impl NotaryException {
    pub fn new(tx_id: SecureHash, error: NotaryError) -> Self {
        Self {
            tx_id,
            error,
            evidence: None,
        }
    }

    pub fn conflicts(&self) -> Option<&BTreeMap<StateRef, StateConsumptionDetails>> {
        match &self.error {
            NotaryError::Conflict { consumed_states, .. } => Some(consumed_states),
            _ => None,
        }
    }
}

impl TransportableError for NotaryException {
    const CODE: &'static str = "notary";
}

pub type NotaryResult<T> = Result<T, NotaryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use lf_01_task_engine::FlowError;

    #[test]
    fn test_consumption_details_hide_transaction_id() {
        let tx_id = SecureHash::sha256(b"winner");
        let details = StateConsumptionDetails::consumed_by(&tx_id, ConsumedStateType::InputState);
        assert_ne!(details.hash_of_transaction_id, tx_id);
        assert_eq!(details.hash_of_transaction_id, SecureHash::sha256(tx_id.as_bytes()));
    }

    #[test]
    fn test_exception_crosses_sessions_intact() {
        let mut consumed = BTreeMap::new();
        consumed.insert(
            StateRef::new(SecureHash::sha256(b"s"), 0),
            StateConsumptionDetails::consumed_by(&SecureHash::sha256(b"t1"), ConsumedStateType::ReferenceInputState),
        );
        let ex = NotaryException::new(
            SecureHash::sha256(b"t2"),
            NotaryError::Conflict {
                tx_id: SecureHash::sha256(b"t2"),
                consumed_states: consumed.clone(),
            },
        );

        let remote = match ex.clone().into_flow_error() {
            FlowError::Exception(e) => FlowError::Remote(e),
            other => other,
        };
        let decoded = NotaryException::from_flow_error(&remote).unwrap();
        assert_eq!(decoded, ex);
        assert_eq!(decoded.conflicts(), Some(&consumed));
    }

    #[test]
    fn test_time_window_message_shows_open_ends() {
        let now = Utc::now();
        let err = NotaryError::TimeWindowInvalid {
            current_time: now,
            tx_time_window: TimeWindow::until_only(now),
        };
        assert!(err.to_string().contains("-inf"));
        assert_eq!(err.kind(), "time_window");
    }
}
