//! Receiving side of [`crate::SendTransactionFlow`] and
//! [`crate::SendHashesFlow`].

use crate::config::ResolutionConfig;
use crate::domain::{SendContent, SendPayload};
use crate::flows::resolve::ResolveTransactionsFlow;
use async_trait::async_trait;
use lf_01_task_engine::{FlowContext, FlowError, FlowLogic, FlowResult, FlowSession};
use shared_types::{SecureHash, SignedTransaction};
use tracing::info;

/// A transaction received and resolved, with the sender's extra data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedTransaction {
    pub transaction: SignedTransaction,
    pub extra_data: Option<Vec<u8>>,
}

/// Receive a transaction, resolve its backchain and verify it.
pub struct ReceiveTransactionFlow {
    session: FlowSession,
    check_sufficient_signatures: bool,
    record: bool,
    config: ResolutionConfig,
}

impl ReceiveTransactionFlow {
    /// Verify with all required signatures present and record the result.
    pub fn new(session: FlowSession) -> Self {
        Self {
            session,
            check_sufficient_signatures: true,
            record: true,
            config: ResolutionConfig::default(),
        }
    }

    /// Accept transactions still missing signatures; only the attached ones
    /// are checked.
    pub fn allowing_missing_signatures(mut self) -> Self {
        self.check_sufficient_signatures = false;
        self
    }

    pub fn without_recording(mut self) -> Self {
        self.record = false;
        self
    }

    pub fn with_config(mut self, config: ResolutionConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl FlowLogic for ReceiveTransactionFlow {
    type Output = ReceivedTransaction;

    fn name(&self) -> &'static str {
        "lf.receive-transaction"
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<ReceivedTransaction> {
        let payload = ctx.receive::<SendPayload>(&self.session).await?.into_inner();
        let stx = match payload.content {
            SendContent::Transaction(stx) => *stx,
            SendContent::Hashes(_) => {
                return Err(FlowError::illegal("expected a transaction, received transaction ids"))
            }
        };
        stx.check_signatures_are_valid()?;

        ctx.sub_flow(
            ResolveTransactionsFlow::for_transaction(stx.clone(), self.session.clone()).with_config(self.config.clone()),
        )
        .await?;

        let hub = ctx.hub().clone();
        hub.verify_transaction(&stx, self.check_sufficient_signatures)?;
        if self.record {
            hub.record_transactions([stx.clone()]);
        }
        info!(tx_id = %stx.id(), counterparty = %self.session.counterparty, "Transaction received");
        Ok(ReceivedTransaction {
            transaction: stx,
            extra_data: payload.extra_data,
        })
    }
}

/// Ids received and resolved, with the sender's extra data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedHashes {
    pub hashes: Vec<SecureHash>,
    pub extra_data: Option<Vec<u8>>,
}

/// Receive transaction ids and resolve and record them with their
/// backchain.
pub struct ReceiveHashesFlow {
    session: FlowSession,
    config: ResolutionConfig,
}

impl ReceiveHashesFlow {
    pub fn new(session: FlowSession) -> Self {
        Self {
            session,
            config: ResolutionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolutionConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl FlowLogic for ReceiveHashesFlow {
    type Output = ReceivedHashes;

    fn name(&self) -> &'static str {
        "lf.receive-hashes"
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<ReceivedHashes> {
        let payload = ctx.receive::<SendPayload>(&self.session).await?.into_inner();
        let hashes = match payload.content {
            SendContent::Hashes(hashes) => hashes,
            SendContent::Transaction(_) => {
                return Err(FlowError::illegal("expected transaction ids, received a transaction"))
            }
        };
        ctx.sub_flow(
            ResolveTransactionsFlow::for_hashes(hashes.clone(), self.session.clone()).with_config(self.config.clone()),
        )
        .await?;
        Ok(ReceivedHashes {
            hashes,
            extra_data: payload.extra_data,
        })
    }
}
