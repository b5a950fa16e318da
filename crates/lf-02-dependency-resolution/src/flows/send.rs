//! # Sending Side
//!
//! The sender opens with a [`SendPayload`] and then serves fetch requests
//! until the receiver says it is done. Only the transitive dependencies of
//! what was sent can be requested:
//!
//! ```text
//! authorised = deps(sent) ∪ attachments(sent) ∪ params(sent)
//! serve(tx)  ⇒ authorised ∪= deps(tx) ∪ attachments(tx) ∪ params(tx)
//! ```

use crate::domain::{DataType, FetchRequest, SendContent, SendPayload};
use crate::error::ResolutionError;
use crate::flows::fetch::Fetchable;
use async_trait::async_trait;
use lf_01_task_engine::{FlowContext, FlowError, FlowLogic, FlowResult, FlowSession, ServiceHub, TransportableError};
use serde::Serialize;
use shared_types::{Attachment, NetworkParameters, SecureHash, SignedTransaction};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Sends an opening message, then vends the dependencies it authorises.
///
/// The opening is normally a [`SendPayload`]. Protocols that carry a
/// transaction inside their own message use [`DataVendingFlow::opening_with`].
pub struct DataVendingFlow<P = SendPayload> {
    session: FlowSession,
    opening: P,
    authorised: Vec<SecureHash>,
}

impl DataVendingFlow<SendPayload> {
    pub fn new(session: FlowSession, payload: SendPayload) -> Self {
        let authorised = payload.initially_authorised();
        Self {
            session,
            opening: payload,
            authorised,
        }
    }
}

impl<P> DataVendingFlow<P>
where
    P: Serialize + Send + Sync,
{
    /// Open with `opening` and serve the backchain of `stx`.
    pub fn opening_with(session: FlowSession, opening: P, stx: &SignedTransaction) -> Self {
        let mut authorised = BTreeSet::new();
        extend_authorised(&mut authorised, stx);
        Self {
            session,
            opening,
            authorised: authorised.into_iter().collect(),
        }
    }

    fn serve<T: Fetchable>(
        &self,
        hub: &ServiceHub,
        hashes: &[SecureHash],
        authorised: &BTreeSet<SecureHash>,
    ) -> FlowResult<Vec<T>> {
        hashes
            .iter()
            .map(|id| {
                if T::DATA_TYPE != DataType::Parameters && !authorised.contains(id) {
                    warn!(counterparty = %self.session.counterparty, requested = %id, "Illegal dependency request");
                    return Err(ResolutionError::IllegalTransactionRequest { requested: *id }.into_flow_error());
                }
                T::load(hub, id).ok_or_else(|| ResolutionError::HashNotFound { requested: *id }.into_flow_error())
            })
            .collect()
    }
}

fn extend_authorised(authorised: &mut BTreeSet<SecureHash>, stx: &SignedTransaction) {
    authorised.extend(stx.dependencies());
    authorised.extend(stx.tx.attachments().iter().copied());
    authorised.extend(stx.tx.network_parameters_hash());
}

#[async_trait]
impl<P> FlowLogic for DataVendingFlow<P>
where
    P: Serialize + Send + Sync,
{
    type Output = ();

    fn name(&self) -> &'static str {
        "lf.data-vending"
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<()> {
        let hub = ctx.hub().clone();
        let mut authorised: BTreeSet<SecureHash> = self.authorised.iter().copied().collect();
        ctx.send(&self.session, &self.opening).await?;

        loop {
            let request = ctx.receive::<FetchRequest>(&self.session).await?.into_inner();
            let (hashes, data_type) = match request {
                FetchRequest::End => {
                    debug!(counterparty = %self.session.counterparty, "Dependency requests complete");
                    return Ok(());
                }
                FetchRequest::Data { hashes, data_type } => (hashes, data_type),
            };
            if hashes.is_empty() {
                return Err(FlowError::illegal("empty fetch request"));
            }
            debug!(
                counterparty = %self.session.counterparty,
                data_type = %data_type,
                count = hashes.len(),
                "Serving dependency request"
            );
            match data_type {
                DataType::Transaction => {
                    let items: Vec<SignedTransaction> = self.serve(&hub, &hashes, &authorised)?;
                    for stx in &items {
                        extend_authorised(&mut authorised, stx);
                    }
                    ctx.send(&self.session, &items).await?;
                }
                DataType::Attachment => {
                    let items: Vec<Attachment> = self.serve(&hub, &hashes, &authorised)?;
                    ctx.send(&self.session, &items).await?;
                }
                DataType::Parameters => {
                    let items: Vec<NetworkParameters> = self.serve(&hub, &hashes, &authorised)?;
                    ctx.send(&self.session, &items).await?;
                }
            }
        }
    }
}

/// Send a signed transaction and serve its backchain.
pub struct SendTransactionFlow {
    session: FlowSession,
    stx: SignedTransaction,
    extra_data: Option<Vec<u8>>,
}

impl SendTransactionFlow {
    pub fn new(session: FlowSession, stx: SignedTransaction) -> Self {
        Self {
            session,
            stx,
            extra_data: None,
        }
    }

    pub fn with_extra_data(mut self, extra_data: Vec<u8>) -> Self {
        self.extra_data = Some(extra_data);
        self
    }
}

#[async_trait]
impl FlowLogic for SendTransactionFlow {
    type Output = ();

    fn name(&self) -> &'static str {
        "lf.send-transaction"
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<()> {
        let payload = SendPayload {
            content: SendContent::Transaction(Box::new(self.stx.clone())),
            extra_data: self.extra_data.clone(),
        };
        ctx.sub_flow(DataVendingFlow::new(self.session.clone(), payload)).await
    }
}

/// Send bare transaction ids and serve them with their backchain.
pub struct SendHashesFlow {
    session: FlowSession,
    hashes: Vec<SecureHash>,
    extra_data: Option<Vec<u8>>,
}

impl SendHashesFlow {
    pub fn new(session: FlowSession, hashes: Vec<SecureHash>) -> Self {
        Self {
            session,
            hashes,
            extra_data: None,
        }
    }

    pub fn with_extra_data(mut self, extra_data: Vec<u8>) -> Self {
        self.extra_data = Some(extra_data);
        self
    }
}

#[async_trait]
impl FlowLogic for SendHashesFlow {
    type Output = ();

    fn name(&self) -> &'static str {
        "lf.send-hashes"
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<()> {
        let payload = SendPayload {
            content: SendContent::Hashes(self.hashes.clone()),
            extra_data: self.extra_data.clone(),
        };
        ctx.sub_flow(DataVendingFlow::new(self.session.clone(), payload)).await
    }
}
