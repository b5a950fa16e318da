//! Resolution flows.

pub mod fetch;
pub mod receive;
pub mod resolve;
pub mod send;

pub use fetch::{
    FetchAttachmentsFlow, FetchDataFlow, FetchNetworkParametersFlow, FetchResult, FetchTransactionsFlow,
    Fetchable,
};
pub use receive::{ReceiveHashesFlow, ReceiveTransactionFlow, ReceivedHashes, ReceivedTransaction};
pub use resolve::{ResolutionTarget, ResolveTransactionsFlow};
pub use send::{DataVendingFlow, SendHashesFlow, SendTransactionFlow};
