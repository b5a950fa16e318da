//! # Flow Errors
//!
//! [`FlowError`] is the only failure type a flow returns. It is `Clone` and
//! serialisable because the outcome of a suspension point (including a
//! failed async operation) is written to the checkpoint journal.
//!
//! Only a [`FlowException`] crosses a session. Any other error reaching a
//! counterparty is reduced to its [`ErrorId`], so the two sides can correlate
//! the failure without the cause leaking.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::encoding;
use shared_types::{
    EncodingError, FilteredTransactionVerificationError, SecureHash, SignatureError,
    TransactionBuildError,
};
use std::fmt;
use thiserror::Error;

/// Correlation identifier shared by every observer of one failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorId(pub u64);

impl ErrorId {
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// An error that is allowed to cross a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowException {
    pub error_id: ErrorId,
    /// Stable discriminator used to decode `details`.
    pub code: String,
    pub message: String,
    /// Encoded typed payload, see [`TransportableError`].
    pub details: Option<Vec<u8>>,
}

impl FlowException {
    /// Code for exceptions raised with only a message.
    pub const GENERIC: &'static str = "flow";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error_id: ErrorId::random(),
            code: Self::GENERIC.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: &str, message: impl Into<String>, details: Option<Vec<u8>>) -> Self {
        Self {
            error_id: ErrorId::random(),
            code: code.to_string(),
            message: message.into(),
            details,
        }
    }
}

impl fmt::Display for FlowException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message, self.error_id)
    }
}

/// A typed error that can be carried inside a [`FlowException`] and decoded
/// back on the other side.
pub trait TransportableError: Serialize + DeserializeOwned + fmt::Display + Sized {
    /// Stable code identifying this error type on the wire.
    const CODE: &'static str;

    fn to_exception(&self) -> FlowException {
        FlowException::with_details(Self::CODE, self.to_string(), encoding::encode(self).ok())
    }

    fn into_flow_error(self) -> FlowError {
        FlowError::Exception(self.to_exception())
    }

    fn from_exception(exception: &FlowException) -> Option<Self> {
        if exception.code != Self::CODE {
            return None;
        }
        exception
            .details
            .as_ref()
            .and_then(|d| encoding::decode(d).ok())
    }

    /// Recover the typed error from a local or remote flow failure.
    fn from_flow_error(error: &FlowError) -> Option<Self> {
        match error {
            FlowError::Exception(ex) | FlowError::Remote(ex) => Self::from_exception(ex),
            _ => None,
        }
    }
}

/// Failure of a flow.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FlowError {
    /// Raised locally; propagated to counterparties with its details.
    #[error("Flow exception: {0}")]
    Exception(FlowException),

    /// Raised by a counterparty and re-thrown here.
    #[error("Counterparty flow failed: {0}")]
    Remote(FlowException),

    /// Counterparty ended the session or failed with an error it could not
    /// disclose.
    #[error("Counterparty {party} ended unexpectedly{}", error_id.map(|id| format!(" (error id {id})")).unwrap_or_default())]
    UnexpectedFlowEnd {
        party: String,
        error_id: Option<ErrorId>,
    },

    #[error("Flow {run_id} was killed")]
    Killed { run_id: String },

    /// Received value's declared type does not match the expected type.
    #[error("Expected to receive {expected} but counterparty sent {actual}")]
    UnexpectedType { expected: String, actual: String },

    /// Re-execution diverged from the checkpoint journal.
    #[error("Flow replay diverged from checkpoint: expected {expected}, got {actual}")]
    NonDeterministicReplay { expected: String, actual: String },

    #[error("Flow {flow} does not initiate sessions and has no initiating parent")]
    NotInitiating { flow: String },

    #[error("Session {0} is not accessible from this flow")]
    SessionNotAccessible(String),

    #[error("Counterparty {party} did not respond after {attempts} attempt(s)")]
    RetriesExhausted { party: String, attempts: u32 },

    #[error("No flow registered under name {0}")]
    UnknownFlow(String),

    /// Local precondition failure.
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Transaction {tx_id} failed verification: {reason}")]
    TransactionVerification { tx_id: SecureHash, reason: String },

    #[error("Transaction {tx_id} depends on {missing} which is not held locally")]
    TransactionResolution {
        tx_id: SecureHash,
        missing: SecureHash,
    },

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    TransactionBuild(#[from] TransactionBuildError),

    #[error(transparent)]
    FilteredTransaction(#[from] FilteredTransactionVerificationError),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Messaging failure: {0}")]
    Messaging(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    pub fn illegal(message: impl Into<String>) -> Self {
        FlowError::IllegalArgument(message.into())
    }

    /// A generic transportable failure with just a message.
    pub fn exception(message: impl Into<String>) -> Self {
        FlowError::Exception(FlowException::new(message))
    }

    /// What a counterparty learns about this failure.
    pub(crate) fn to_session_error(&self) -> (Option<FlowException>, ErrorId) {
        match self {
            FlowError::Exception(ex) | FlowError::Remote(ex) => (Some(ex.clone()), ex.error_id),
            _ => (None, ErrorId::random()),
        }
    }
}

/// Result type for flow operations
pub type FlowResult<T> = Result<T, FlowError>;
