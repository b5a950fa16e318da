//! # lf-03-notarisation
//!
//! Double-spend prevention for transactions with inputs, references or a
//! time window.
//!
//! ## Overview
//!
//! - **NotaryFlow**: the requester side. Checks the transaction is fully
//!   signed apart from the notary, signs a request naming the inputs, and
//!   validates whatever comes back.
//! - **NotaryServiceFlow**: the notary side. Checks the request, resolves
//!   and verifies the backchain when validating, and commits to the
//!   uniqueness provider.
//! - **BatchingUniquenessProvider**: single-writer commit log; of two
//!   overlapping requests exactly one wins.
//!
//! ## Protocol
//!
//! ```text
//! Requester                                   Notary
//!   │── NotarisationPayload(Filtered) ───────────▶│  non-validating
//!   │◀── NotaryReply ─────────────────────────────│
//!
//!   │── NotarisationPayload(Full) ───────────────▶│  validating
//!   │◀── FetchRequest::Data ... FetchRequest::End ─│
//!   │◀── NotaryReply ─────────────────────────────│
//! ```
//!
//! ## Refusals
//!
//! | Error | Cause |
//! |-------|-------|
//! | `Conflict` | an input or reference was consumed by another transaction |
//! | `TimeWindowInvalid` | notary clock outside the window, after tolerance |
//! | `TransactionInvalid` | malformed, too large, or fails validation |
//! | `WrongNotary` | transaction names a different notary |
//! | `RequestSignatureInvalid` | request not signed by the requester |
//!
//! Every refusal is signed by the notary and reaches the requester as a
//! [`NotaryException`] carrying that evidence.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod flows;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::BatchingUniquenessProvider;
pub use config::NotaryConfig;
pub use domain::{
    NotarisationPayload, NotarisationRequest, NotarisationRequestSignature, NotarisationResponse,
    NotarisedTransaction, NotaryReply,
};
pub use error::{ConsumedStateType, NotaryError, NotaryException, NotaryResult, StateConsumptionDetails};
pub use flows::{NotaryFlow, NotaryServiceFlow};
pub use ports::{CommitRequest, RequestLogEntry, UniquenessProvider};
pub use service::NotaryService;
