//! # Sessions and Messages
//!
//! A session is addressed by two ids, one per side. The initiator picks its
//! own id and derives the responder's from it, so both sides know where to
//! send without a confirmation round trip:
//!
//! ```text
//! initiator (S_i) ── Init, Data(1), Data(2) ... ──▶ responder (S_r = derive(S_i))
//!                 ◀── Data(0), Data(1) ... End ───
//! ```
//!
//! Every message carries a per-direction sequence number. Receivers process
//! strictly in sequence order and drop anything at or below what they have
//! already acknowledged, which makes redelivery harmless.

use crate::error::{FlowError, FlowException, FlowResult, ErrorId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_crypto::Sha256Hasher;
use shared_types::{encoding, Party};
use std::fmt;
use uuid::Uuid;

/// Identifier of a top-level flow run. Stable across restarts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunId({})", self.0)
    }
}

/// One side's address of a session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    fn from_digest(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(Uuid::from_bytes(bytes))
    }

    /// The `index`th session opened by a run. Deterministic so a replayed
    /// run opens the same sessions.
    pub fn for_run(run_id: &RunId, index: u64) -> Self {
        Self::from_digest(&[b"session", run_id.0.as_bytes(), &index.to_le_bytes()])
    }

    /// The responder-side id paired with this initiator-side id.
    pub fn responder_side(&self) -> Self {
        Self::from_digest(&[b"responder", self.0.as_bytes()])
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", &self.0.to_string()[..8])
    }
}

/// What an initiator tells the responder about itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowInfo {
    pub flow_version: u32,
    pub app_name: String,
}

/// A typed value on the wire. The declared type is checked on receipt.
///
/// The tag is [`std::any::type_name`], whose output is not guaranteed to be
/// stable across compiler versions. Nodes exchanging payloads must run the
/// same build, and checkpoints journaled by an older build should be drained
/// before upgrading. A tag from a different build is refused as
/// [`FlowError::UnexpectedType`] and never decoded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub type_name: String,
    pub bytes: Vec<u8>,
}

impl Payload {
    pub fn encode<T: Serialize>(value: &T) -> FlowResult<Self> {
        Ok(Self {
            type_name: std::any::type_name::<T>().to_string(),
            bytes: encoding::encode(value)?,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> FlowResult<T> {
        let expected = std::any::type_name::<T>();
        if self.type_name != expected {
            return Err(FlowError::UnexpectedType {
                expected: expected.to_string(),
                actual: self.type_name.clone(),
            });
        }
        Ok(encoding::decode(&self.bytes)?)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({}, {} bytes)", self.type_name, self.bytes.len())
    }
}

/// Message body variants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    /// Opens a session. Always sequence 0 from the initiator.
    Init {
        initiating_flow: String,
        initiator_session: SessionId,
        flow_info: FlowInfo,
    },
    Data(Payload),
    /// The sender's flow failed. `exception` is `None` when the cause may
    /// not be disclosed.
    Error {
        exception: Option<FlowException>,
        error_id: ErrorId,
    },
    /// The sender will not send on this session again.
    End,
}

impl MessageBody {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Init { .. } => "init",
            MessageBody::Data(_) => "data",
            MessageBody::Error { .. } => "error",
            MessageBody::End => "end",
        }
    }
}

/// A message addressed to one side of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub recipient: SessionId,
    pub sender: Party,
    pub seq: u64,
    pub body: MessageBody,
}

/// Handle to a session, passed to sub-flows and responders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSession {
    pub(crate) local: SessionId,
    pub counterparty: Party,
}

impl FlowSession {
    pub fn id(&self) -> SessionId {
        self.local
    }
}

/// Engine-side state of a session. Rebuilt identically by replay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub local: SessionId,
    pub remote: SessionId,
    pub counterparty: Party,
    /// Whether this side opened the session.
    pub initiator: bool,
    pub init_sent: bool,
    pub next_send_seq: u64,
    pub next_recv_seq: u64,
    /// Counterparty sent `End` or `Error`.
    pub ended_by_peer: bool,
    /// We sent `End`.
    pub closed: bool,
    /// Set on the responder side from the `Init` message.
    pub counterparty_flow_info: Option<FlowInfo>,
    /// Initiating flow name and version announced in `Init`.
    pub initiating_flow: String,
    pub flow_version: u32,
    /// Namespace of the flow frame that opened the session.
    pub namespace: u32,
}

impl SessionRecord {
    pub fn initiated(
        local: SessionId,
        counterparty: Party,
        initiating_flow: &str,
        flow_version: u32,
        namespace: u32,
    ) -> Self {
        Self {
            local,
            remote: local.responder_side(),
            counterparty,
            initiator: true,
            init_sent: false,
            next_send_seq: 0,
            next_recv_seq: 0,
            ended_by_peer: false,
            closed: false,
            counterparty_flow_info: None,
            initiating_flow: initiating_flow.to_string(),
            flow_version,
            namespace,
        }
    }

    /// Responder side of a session opened by `init`. The `Init` itself is
    /// sequence 0, so data starts at 1.
    pub fn accepted(
        local: SessionId,
        initiator_session: SessionId,
        counterparty: Party,
        initiating_flow: &str,
        flow_info: FlowInfo,
    ) -> Self {
        Self {
            local,
            remote: initiator_session,
            counterparty,
            initiator: false,
            init_sent: true,
            next_send_seq: 0,
            next_recv_seq: 1,
            ended_by_peer: false,
            closed: false,
            flow_version: flow_info.flow_version,
            counterparty_flow_info: Some(flow_info),
            initiating_flow: initiating_flow.to_string(),
            namespace: 0,
        }
    }

    /// Still expecting to hear from us.
    pub fn is_open(&self) -> bool {
        self.init_sent && !self.ended_by_peer && !self.closed
    }
}

/// A value received from a counterparty, not yet checked.
///
/// The only way to get at the value is [`UntrustworthyData::unwrap`] with a
/// validator, so every receive site has to state what it checks.
#[derive(Debug)]
pub struct UntrustworthyData<T>(T);

impl<T> UntrustworthyData<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(value)
    }

    /// Validate and release the value.
    pub fn unwrap<R>(self, validator: impl FnOnce(T) -> FlowResult<R>) -> FlowResult<R> {
        validator(self.0)
    }

    /// Release without validation, for values that are checked further down.
    pub fn into_inner(self) -> T {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_deterministic_per_run() {
        let run = RunId(Uuid::from_u128(42));
        assert_eq!(SessionId::for_run(&run, 0), SessionId::for_run(&run, 0));
        assert_ne!(SessionId::for_run(&run, 0), SessionId::for_run(&run, 1));
        let s = SessionId::for_run(&run, 0);
        assert_ne!(s, s.responder_side());
        assert_eq!(s.responder_side(), s.responder_side());
    }

    #[test]
    fn test_payload_type_check() {
        let payload = Payload::encode(&42u64).unwrap();
        assert_eq!(payload.decode::<u64>().unwrap(), 42);
        let err = payload.decode::<String>().unwrap_err();
        assert!(matches!(err, FlowError::UnexpectedType { .. }));
    }

    #[test]
    fn test_payload_tagged_by_another_build_is_refused() {
        let mut payload = Payload::encode(&42u64).unwrap();
        payload.type_name = "core::primitive::u64".to_string();

        let err = payload.decode::<u64>().unwrap_err();

        assert_eq!(
            err,
            FlowError::UnexpectedType {
                expected: std::any::type_name::<u64>().to_string(),
                actual: "core::primitive::u64".to_string(),
            }
        );
    }

    #[test]
    fn test_untrustworthy_data_validator_runs() {
        let data = UntrustworthyData::new(5u32);
        let result = data.unwrap(|v| {
            if v > 3 {
                Err(FlowError::illegal("too big"))
            } else {
                Ok(v)
            }
        });
        assert!(matches!(result, Err(FlowError::IllegalArgument(_))));
    }
}
