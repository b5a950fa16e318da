//! Ports layer
//!
//! - `inbound`: traits flow authors implement
//! - `outbound`: collaborators the engine consumes

pub mod inbound;
pub mod outbound;

pub use inbound::{DynFlow, FlowExternalOperation, FlowLogic};
pub use outbound::{
    AttachmentStorage, CheckpointStorage, Clock, IdentityService, KeyManagementService,
    MessagingService, NetworkMapCache, NetworkParametersStorage, TransactionStorage,
    TransactionVerifier,
};
