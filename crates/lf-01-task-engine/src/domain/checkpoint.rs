//! # Checkpoints
//!
//! A flow is a persisted state machine driven by re-execution. The
//! checkpoint stores how the flow was started plus a journal with one entry
//! per completed suspension point. Resuming means constructing the flow
//! again and running it from the top: each suspension point is answered from
//! the journal instead of doing I/O, until the journal is exhausted and the
//! flow continues live.
//!
//! ```text
//!   start ──▶ [send] ──▶ [receive] ──▶ [async op] ──▶ ... ──▶ done
//!              │ j[0]       │ j[1]         │ j[2]
//!              ▼            ▼              ▼
//!           persisted    persisted      persisted
//! ```
//!
//! Flow code must therefore be deterministic between suspension points.
//! Divergence is detected by comparing each requested [`SuspensionKind`]
//! with the journaled one.

use crate::domain::session::{FlowInfo, MessageBody, RunId, SessionId, SessionRecord};
use crate::error::FlowError;
use serde::{Deserialize, Serialize};
use shared_types::{Party, SecureHash, SignedTransaction};
use std::fmt;

/// How a flow came to exist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStart {
    /// Started locally with encoded constructor arguments.
    Explicit { flow_name: String, args: Vec<u8> },
    /// Started by a counterparty's `Init`.
    Initiated {
        initiating_flow: String,
        local: SessionId,
        initiator_session: SessionId,
        counterparty: Party,
        flow_info: FlowInfo,
    },
}

/// A point where the flow yields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspensionKind {
    Send { session: SessionId },
    Receive { session: SessionId },
    ReceiveWithTimeout { session: SessionId, timeout_ms: u64 },
    Sleep { millis: u64 },
    WaitForLedgerCommit { tx_id: SecureHash },
    ExecuteAsync { token: String },
}

impl fmt::Display for SuspensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuspensionKind::Send { session } => write!(f, "send({session})"),
            SuspensionKind::Receive { session } => write!(f, "receive({session})"),
            SuspensionKind::ReceiveWithTimeout { session, timeout_ms } => {
                write!(f, "receive({session}, {timeout_ms}ms)")
            }
            SuspensionKind::Sleep { millis } => write!(f, "sleep({millis}ms)"),
            SuspensionKind::WaitForLedgerCommit { tx_id } => write!(f, "wait_for_commit({tx_id})"),
            SuspensionKind::ExecuteAsync { token } => write!(f, "execute_async({token})"),
        }
    }
}

/// What a suspension point resolved to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoOutcome {
    Sent,
    Received(MessageBody),
    TimedOut,
    Slept,
    Committed(Box<SignedTransaction>),
    AsyncResult(Result<Vec<u8>, FlowError>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub kind: SuspensionKind,
    pub outcome: IoOutcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStatus {
    Runnable,
    /// Blocked in a live suspension point.
    Suspended,
}

/// Everything needed to resume a flow after a restart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: RunId,
    pub flow_name: String,
    pub our_identity: Party,
    pub start: FlowStart,
    pub journal: Vec<JournalEntry>,
    /// Snapshot of the session table at the last suspension.
    pub sessions: Vec<SessionRecord>,
    /// The suspension point the flow was blocked in when persisted.
    pub pending: Option<SuspensionKind>,
    pub status: FlowStatus,
}

impl Checkpoint {
    pub fn new(run_id: RunId, flow_name: &str, our_identity: Party, start: FlowStart) -> Self {
        Self {
            run_id,
            flow_name: flow_name.to_string(),
            our_identity,
            start,
            journal: Vec::new(),
            sessions: Vec::new(),
            pending: None,
            status: FlowStatus::Runnable,
        }
    }

    /// The initiating session id a responder was started for, if any.
    pub fn initiated_by(&self) -> Option<SessionId> {
        match &self.start {
            FlowStart::Initiated { local, .. } => Some(*local),
            FlowStart::Explicit { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::encoding;
    use shared_types::PublicKey;
    use uuid::Uuid;

    #[test]
    fn test_checkpoint_survives_encoding() {
        let run = RunId(Uuid::from_u128(7));
        let session = SessionId::for_run(&run, 0);
        let me = Party::new("A", PublicKey([1; 32]));
        let mut checkpoint = Checkpoint::new(
            run,
            "Demo",
            me,
            FlowStart::Explicit {
                flow_name: "Demo".into(),
                args: vec![1, 2, 3],
            },
        );
        checkpoint.journal.push(JournalEntry {
            kind: SuspensionKind::Send { session },
            outcome: IoOutcome::Sent,
        });
        checkpoint.journal.push(JournalEntry {
            kind: SuspensionKind::ExecuteAsync { token: "t".into() },
            outcome: IoOutcome::AsyncResult(Err(FlowError::illegal("no"))),
        });

        let bytes = encoding::encode(&checkpoint).unwrap();
        let decoded: Checkpoint = encoding::decode(&bytes).unwrap();
        assert_eq!(decoded, checkpoint);
        assert_eq!(decoded.initiated_by(), None);
    }
}
