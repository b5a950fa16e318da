//! Signature collection and finality flows.

pub mod collect;
pub mod finality;

pub use collect::{CollectSignaturesFlow, SignTransactionFlow};
pub use finality::{BroadcastTransactionFlow, FinalityFlow, ReceiveFinalisedTransactionFlow};
