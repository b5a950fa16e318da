//! Drives one flow run from start (or checkpoint) to completion.

use crate::context::FlowContext;
use crate::domain::Checkpoint;
use crate::error::{FlowError, FlowResult};
use crate::ports::DynFlow;
use crate::services::ServiceHub;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Run `flow` against `checkpoint`, replaying its journal first.
///
/// The checkpoint must already be persisted. On completion the outcome is
/// delivered to every open session and the checkpoint is removed.
pub(crate) async fn drive(
    hub: Arc<ServiceHub>,
    flow: Arc<dyn DynFlow>,
    checkpoint: Checkpoint,
    kill: watch::Receiver<bool>,
) -> FlowResult<Vec<u8>> {
    let run_id = checkpoint.run_id;
    let journaled = checkpoint.journal.len();
    let mut ctx = FlowContext::new(hub.clone(), checkpoint, kill);

    if journaled > 0 {
        info!(run_id = %run_id, flow = flow.name(), journaled, "Resuming flow from checkpoint");
    } else {
        info!(run_id = %run_id, flow = flow.name(), node = %hub.my_identity, "Flow started");
    }

    let mut result = flow.call_erased(&mut ctx).await;
    if result.is_ok() && ctx.is_replaying() {
        result = Err(FlowError::NonDeterministicReplay {
            expected: "further suspension points".into(),
            actual: "flow completion".into(),
        });
    }

    let error_id = ctx.finish(&result).await;
    if let Err(e) = hub.checkpoints.remove(&run_id) {
        warn!(run_id = %run_id, error = %e, "Failed to remove checkpoint");
    }

    match &result {
        Ok(_) => info!(run_id = %run_id, flow = flow.name(), "Flow completed"),
        Err(FlowError::Killed { .. }) => info!(run_id = %run_id, flow = flow.name(), "Flow killed"),
        Err(e) => match error_id {
            Some(error_id) => {
                warn!(run_id = %run_id, flow = flow.name(), %error_id, error = %e, "Flow failed")
            }
            None => warn!(run_id = %run_id, flow = flow.name(), error = %e, "Flow failed"),
        },
    }
    result
}
