//! # lf-04-finality
//!
//! Takes a transaction from "signed by its builder" to "final and held by
//! every participant".
//!
//! ## Overview
//!
//! - **CollectSignaturesFlow**: sends the transaction to each required
//!   signer with the keys it is expected to sign with, and gathers exactly
//!   one signature per key.
//! - **SignTransactionFlow**: the signer. Resolves the backchain, checks
//!   the request, runs the application's [`TransactionChecker`], signs and
//!   waits until the transaction is final.
//! - **FinalityFlow**: notarises when the transaction consumes, references
//!   or is time-bound, records it, and broadcasts it to participants.
//!
//! ## Flow
//!
//! ```text
//! builder ── CollectSignatures ──▶ signers
//!    │
//!    ├── Finality ── NotaryFlow ──▶ notary
//!    │      │
//!    │      └── BroadcastTransaction ──▶ participants (record)
//!    ▼
//! final transaction; signers' SignTransactionFlow returns it
//! ```
//!
//! ## Failures
//!
//! | Error | Raised by |
//! |-------|-----------|
//! | `CollectorNotSigned`, `NoSessionForKey`, `UnneededSession` | collector, before sending |
//! | `WrongSignatureCount`, `UnexpectedSigner` | collector, on a signer's reply |
//! | `KeysNotHeld`, `SignatureNotRequired`, `InitiatorNotSigned` | signer |
//! | `TransactionRejected` | signer's checker |
//! | `SelfDelivery` | finality, when told to send to itself |

pub mod error;
pub mod flows;
pub mod ports;

pub use error::{FinalityError, FinalityResult};
pub use flows::{
    BroadcastTransactionFlow, CollectSignaturesFlow, FinalityFlow, ReceiveFinalisedTransactionFlow,
    SignTransactionFlow,
};
pub use ports::TransactionChecker;

use lf_01_task_engine::FlowRegistry;

/// Register the responders every node needs to receive final
/// transactions.
pub fn install_responders(registry: &FlowRegistry) {
    registry.register_responder(BroadcastTransactionFlow::NAME, ReceiveFinalisedTransactionFlow::new);
}
