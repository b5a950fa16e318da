//! Driving Ports (what flow authors implement)
//!
//! A flow is a value with an async `call`. All interaction with the outside
//! world goes through the [`FlowContext`] it is given, which is where
//! suspension points are recorded.

use crate::context::FlowContext;
use crate::domain::ProgressTracker;
use crate::error::FlowResult;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::encoding;

/// A unit of protocol logic.
#[async_trait]
pub trait FlowLogic: Send + Sync {
    type Output: Send;

    /// Registry name. Initiating flows are matched to responders by it.
    fn name(&self) -> &'static str;

    /// Whether sessions opened by this flow start a responder on the other
    /// side. Non-initiating sub-flows open sessions on behalf of their
    /// closest initiating ancestor.
    fn initiating(&self) -> bool {
        false
    }

    fn version(&self) -> u32 {
        1
    }

    fn progress_tracker(&self) -> Option<ProgressTracker> {
        None
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<Self::Output>;
}

/// Object-safe view of a flow whose result can be encoded.
#[async_trait]
pub trait DynFlow: Send + Sync {
    fn name(&self) -> &'static str;
    fn initiating(&self) -> bool;
    fn version(&self) -> u32;
    fn progress_tracker(&self) -> Option<ProgressTracker>;
    async fn call_erased(&self, ctx: &mut FlowContext) -> FlowResult<Vec<u8>>;
}

#[async_trait]
impl<F> DynFlow for F
where
    F: FlowLogic,
    F::Output: Serialize,
{
    fn name(&self) -> &'static str {
        FlowLogic::name(self)
    }

    fn initiating(&self) -> bool {
        FlowLogic::initiating(self)
    }

    fn version(&self) -> u32 {
        FlowLogic::version(self)
    }

    fn progress_tracker(&self) -> Option<ProgressTracker> {
        FlowLogic::progress_tracker(self)
    }

    async fn call_erased(&self, ctx: &mut FlowContext) -> FlowResult<Vec<u8>> {
        let output = ctx.run_frame(self).await?;
        Ok(encoding::encode(&output)?)
    }
}

/// Work run outside the flow, typically against an external system.
///
/// The operation receives a deduplication token that is identical for every
/// re-invocation of the same logical attempt, including after a restart.
#[async_trait]
pub trait FlowExternalOperation: Send + Sync + 'static {
    type Output: Serialize + DeserializeOwned + Send + 'static;

    async fn execute(&self, deduplication_id: String) -> FlowResult<Self::Output>;
}
