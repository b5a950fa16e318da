//! # lf-01-task-engine
//!
//! Suspendable protocol tasks ("flows") that talk to counterparties over
//! sessions and survive process restarts.
//!
//! ## Overview
//!
//! - **Flows**: a [`FlowLogic`] is a value with an async `call`. Flows nest
//!   as sub-flows and share one [`FlowContext`] per run.
//! - **Sessions**: ordered, typed, bidirectional channels between two flows
//!   on different nodes. The first send carries an `Init` that starts the
//!   registered responder on the other side.
//! - **Checkpoints**: every suspension point is journaled. A restarted node
//!   replays the journal and the flow continues as if nothing happened.
//! - **Errors**: failures implementing [`TransportableError`] reach the
//!   counterparty intact; anything else is reported only as an unexpected
//!   session end with an error id.
//!
//! ## Architecture
//!
//! ```text
//!   FlowManager ──spawn──▶ runtime::drive ──▶ FlowLogic::call(ctx)
//!        ▲                                         │
//!        │ Init                                    ▼
//!   MessagingService ◀────── send/receive ──── FlowContext ──▶ CheckpointStorage
//! ```
//!
//! ## Session Lifecycle
//!
//! ```text
//! [created] ──first send/receive──▶ [open] ──End/Error from peer──▶ [ended]
//!                                      │
//!                                      └──close_sessions / flow done──▶ [closed]
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use lf_01_task_engine::test_utils::{MockNetwork, NotarySpec};
//!
//! let network = MockNetwork::with_notaries(&[NotarySpec::non_validating("Notary")])?;
//! let alice = network.create_node("Alice")?;
//! let bob = network.create_node("Bob")?;
//! bob.register_responder("ping", |session| Pong { session });
//!
//! let answer = alice.start_flow(Ping { peer: bob.party.clone() })?.result().await?;
//! ```

pub mod adapters;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod manager;
pub mod ports;
mod runtime;
pub mod services;
pub mod test_utils;

pub use config::FlowConfig;
pub use context::FlowContext;
pub use domain::{
    Checkpoint, FlowInfo, FlowSession, FlowStart, IoOutcome, MessageBody, ProgressTracker, RunId,
    SessionId, SessionMessage, Step, SuspensionKind, UntrustworthyData,
};
pub use error::{ErrorId, FlowError, FlowException, FlowResult, TransportableError};
pub use manager::{FlowHandle, FlowManager, FlowRegistry};
pub use ports::{FlowExternalOperation, FlowLogic};
pub use services::ServiceHub;
