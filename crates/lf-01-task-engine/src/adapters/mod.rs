//! In-memory adapters for the outbound ports.
//!
//! Used by tests and by single-process simulations of a network. State that
//! would be durable on a real node (checkpoints, transactions, inboxes)
//! lives outside the node's [`crate::FlowManager`], so a node can be
//! "restarted" by building a new manager over the same adapters.

pub mod clock;
pub mod identity;
pub mod network;
pub mod storage;

pub use clock::{SystemClock, TestClock};
pub use identity::{AcceptAllVerifier, InMemoryDirectory, InMemoryKeyManagementService};
pub use network::{DeliveredMessage, InMemoryNetwork, NodeMessaging};
pub use storage::{
    InMemoryAttachmentStorage, InMemoryCheckpointStorage, InMemoryNetworkParametersStorage,
    InMemoryTransactionStorage,
};
