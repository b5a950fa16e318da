//! # lf-02-dependency-resolution
//!
//! Peer-to-peer resolution of a transaction's backchain.
//!
//! ## Overview
//!
//! - **TopologicalSort**: orders downloaded transactions so dependencies
//!   come first.
//! - **Fetch flows**: hash-checked download of transactions, attachments
//!   and network parameters.
//! - **ResolveTransactionsFlow**: walks the dependency graph to its
//!   locally held frontier, then verifies and records in order.
//! - **Send/Receive flows**: the sender vends exactly the dependencies of
//!   what it sent; anything else is an illegal request.
//!
//! ## Protocol
//!
//! ```text
//! Sender                                Receiver
//!   │── SendPayload(tx | hashes) ──────────▶│
//!   │◀── FetchRequest::Data{hashes, type} ──│  (repeat)
//!   │── Vec<item> ─────────────────────────▶│
//!   │◀── FetchRequest::End ─────────────────│
//! ```
//!
//! ## Security
//!
//! | Check | Side | Failure |
//! |-------|------|---------|
//! | item hashes to requested id | receiver | `DownloadedVsRequestedDataMismatch` |
//! | response length | receiver | `DownloadedVsRequestedSizeMismatch` |
//! | id in authorised closure | sender | `IllegalTransactionRequest` |
//! | graph size | receiver | `ExcessivelyLargeTransactionGraph` |

pub mod config;
pub mod domain;
pub mod error;
pub mod flows;

pub use config::ResolutionConfig;
pub use domain::{DataType, FetchRequest, SendContent, SendPayload, TopologicalSort};
pub use error::{ResolutionError, ResolutionResult};
pub use flows::{
    DataVendingFlow, FetchAttachmentsFlow, FetchDataFlow, FetchNetworkParametersFlow, FetchResult,
    FetchTransactionsFlow, Fetchable, ReceiveHashesFlow, ReceiveTransactionFlow, ReceivedHashes,
    ReceivedTransaction, ResolutionTarget, ResolveTransactionsFlow, SendHashesFlow, SendTransactionFlow,
};
