//! # Transaction Resolution
//!
//! Downloads the transitive closure of a transaction's dependencies from
//! the peer that sent it, then verifies and records them dependencies
//! first.
//!
//! ```text
//! frontier = deps(target)
//! while frontier ≠ ∅:
//!     fetched   = FetchTransactions(frontier)         (held locally: stop)
//!     graph    += fetched;  frontier = deps(fetched) \ graph
//!     fetch attachments and network parameters of fetched
//! for tx in TopologicalSort(graph): verify(tx); record(tx)
//! send End (unless deferred)
//! ```

use crate::config::ResolutionConfig;
use crate::domain::{FetchRequest, TopologicalSort};
use crate::error::ResolutionError;
use crate::flows::fetch::{FetchAttachmentsFlow, FetchNetworkParametersFlow, FetchTransactionsFlow};
use async_trait::async_trait;
use lf_01_task_engine::{FlowContext, FlowLogic, FlowResult, FlowSession, TransportableError};
use shared_types::{SecureHash, SignedTransaction};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// What to resolve.
#[derive(Clone, Debug)]
pub enum ResolutionTarget {
    /// The dependencies of this transaction, which is not itself recorded.
    Transaction(Box<SignedTransaction>),
    /// These transactions and their dependencies, all recorded.
    Hashes(Vec<SecureHash>),
}

pub struct ResolveTransactionsFlow {
    session: FlowSession,
    target: ResolutionTarget,
    config: ResolutionConfig,
    send_end: bool,
}

impl ResolveTransactionsFlow {
    pub fn for_transaction(stx: SignedTransaction, session: FlowSession) -> Self {
        Self::new(ResolutionTarget::Transaction(Box::new(stx)), session)
    }

    pub fn for_hashes(hashes: Vec<SecureHash>, session: FlowSession) -> Self {
        Self::new(ResolutionTarget::Hashes(hashes), session)
    }

    fn new(target: ResolutionTarget, session: FlowSession) -> Self {
        Self {
            session,
            target,
            config: ResolutionConfig::default(),
            send_end: true,
        }
    }

    pub fn with_config(mut self, config: ResolutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Leave the session open for a further exchange; the caller sends
    /// [`FetchRequest::End`] itself.
    pub fn deferring_end(mut self) -> Self {
        self.send_end = false;
        self
    }

    /// Fetch attachments and network parameters the given transactions
    /// need and we do not hold.
    async fn fetch_attachments_and_parameters(
        &self,
        ctx: &mut FlowContext,
        transactions: &[&SignedTransaction],
    ) -> FlowResult<()> {
        let hub = ctx.hub().clone();
        let attachments: BTreeSet<SecureHash> = transactions
            .iter()
            .flat_map(|stx| stx.tx.attachments().iter().copied())
            .filter(|id| !hub.attachments.has(id))
            .collect();
        if !attachments.is_empty() {
            ctx.sub_flow(
                FetchAttachmentsFlow::new(attachments, self.session.clone()).with_config(self.config.clone()),
            )
            .await?;
        }

        let parameters: BTreeSet<SecureHash> = transactions
            .iter()
            .filter_map(|stx| stx.tx.network_parameters_hash())
            .filter(|hash| hub.network_parameters.get(hash).is_none())
            .collect();
        if let Some(missing) = parameters.first() {
            let version = hub.network_map.platform_version(&self.session.counterparty);
            if !self.config.supports_parameters_fetch(version) {
                return Err(ResolutionError::MissingNetworkParameters { requested: *missing }.into_flow_error());
            }
            ctx.sub_flow(
                FetchNetworkParametersFlow::new(parameters, self.session.clone()).with_config(self.config.clone()),
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl FlowLogic for ResolveTransactionsFlow {
    /// Number of transactions newly recorded.
    type Output = usize;

    fn name(&self) -> &'static str {
        "lf.resolve-transactions"
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<usize> {
        let mut frontier: BTreeSet<SecureHash> = match &self.target {
            ResolutionTarget::Transaction(stx) => {
                self.fetch_attachments_and_parameters(ctx, &[stx.as_ref()]).await?;
                stx.dependencies()
            }
            ResolutionTarget::Hashes(hashes) => hashes.iter().copied().collect(),
        };

        let mut graph = TopologicalSort::new();
        let mut downloaded: HashMap<SecureHash, SignedTransaction> = HashMap::new();

        while !frontier.is_empty() {
            let request = std::mem::take(&mut frontier);
            let fetched = ctx
                .sub_flow(FetchTransactionsFlow::new(request, self.session.clone()).with_config(self.config.clone()))
                .await?;

            let mut new_ids = Vec::with_capacity(fetched.downloaded.len());
            for stx in fetched.downloaded {
                let id = stx.id();
                if graph.contains(&id) {
                    continue;
                }
                let dependencies = stx.dependencies();
                graph.add(id, dependencies.clone()).map_err(|e| e.into_flow_error())?;
                if graph.len() > self.config.max_transactions {
                    return Err(ResolutionError::ExcessivelyLargeTransactionGraph {
                        limit: self.config.max_transactions,
                    }
                    .into_flow_error());
                }
                frontier.extend(dependencies.into_iter().filter(|d| !graph.contains(d)));
                downloaded.insert(id, stx);
                new_ids.push(id);
            }
            frontier.retain(|d| !graph.contains(d));

            let batch: Vec<&SignedTransaction> = new_ids.iter().filter_map(|id| downloaded.get(id)).collect();
            if !batch.is_empty() {
                self.fetch_attachments_and_parameters(ctx, &batch).await?;
            }
        }

        let hub = ctx.hub().clone();
        let total = graph.len();
        let mut recorded = 0;
        for id in graph.complete() {
            let Some(stx) = downloaded.remove(&id) else {
                continue;
            };
            if hub.transactions.get(&id).is_some() {
                continue;
            }
            hub.verify_transaction(&stx, true)?;
            recorded += hub.record_transactions([stx]);
        }
        if total > 0 {
            info!(counterparty = %self.session.counterparty, downloaded = total, recorded, "Backchain resolved");
        } else {
            debug!(counterparty = %self.session.counterparty, "Nothing to resolve");
        }

        if self.send_end {
            ctx.send(&self.session, &FetchRequest::End).await?;
        }
        Ok(recorded)
    }
}
