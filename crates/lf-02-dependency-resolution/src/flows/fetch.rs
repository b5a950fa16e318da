//! # Fetch Flows
//!
//! Load what we have, ask the counterparty for the rest, and check every
//! downloaded item hashes to exactly what was requested before keeping it.
//!
//! | Flow | Item | Stored as |
//! |------|------|-----------|
//! | [`FetchTransactionsFlow`] | `SignedTransaction` | unverified |
//! | [`FetchAttachmentsFlow`] | `Attachment` | imported |
//! | [`FetchNetworkParametersFlow`] | `NetworkParameters` | saved |

use crate::config::ResolutionConfig;
use crate::domain::{DataType, FetchRequest};
use crate::error::ResolutionError;
use async_trait::async_trait;
use lf_01_task_engine::{FlowContext, FlowLogic, FlowResult, FlowSession, ServiceHub, TransportableError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{Attachment, NetworkParameters, SecureHash, SignedTransaction};
use std::marker::PhantomData;
use tracing::{debug, warn};

/// An item that can be requested by hash.
pub trait Fetchable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const DATA_TYPE: DataType;
    const FLOW_NAME: &'static str;

    /// Id recomputed from content.
    fn fetch_id(&self) -> FlowResult<SecureHash>;

    /// The locally held copy, if any. Also what a vending peer serves.
    fn load(hub: &ServiceHub, id: &SecureHash) -> Option<Self>;

    /// Keep validated downloads.
    fn store(hub: &ServiceHub, downloaded: &[Self]) -> FlowResult<()>;
}

impl Fetchable for SignedTransaction {
    const DATA_TYPE: DataType = DataType::Transaction;
    const FLOW_NAME: &'static str = "lf.fetch-transactions";

    fn fetch_id(&self) -> FlowResult<SecureHash> {
        Ok(self.id())
    }

    fn load(hub: &ServiceHub, id: &SecureHash) -> Option<Self> {
        hub.transactions.get(id)
    }

    fn store(hub: &ServiceHub, downloaded: &[Self]) -> FlowResult<()> {
        for stx in downloaded {
            hub.transactions.add_unverified(stx.clone());
        }
        Ok(())
    }
}

impl Fetchable for Attachment {
    const DATA_TYPE: DataType = DataType::Attachment;
    const FLOW_NAME: &'static str = "lf.fetch-attachments";

    fn fetch_id(&self) -> FlowResult<SecureHash> {
        Ok(self.id())
    }

    fn load(hub: &ServiceHub, id: &SecureHash) -> Option<Self> {
        hub.attachments.get(id)
    }

    fn store(hub: &ServiceHub, downloaded: &[Self]) -> FlowResult<()> {
        for attachment in downloaded {
            hub.attachments.import(attachment.clone());
        }
        Ok(())
    }
}

impl Fetchable for NetworkParameters {
    const DATA_TYPE: DataType = DataType::Parameters;
    const FLOW_NAME: &'static str = "lf.fetch-network-parameters";

    fn fetch_id(&self) -> FlowResult<SecureHash> {
        Ok(self.hash()?)
    }

    fn load(hub: &ServiceHub, id: &SecureHash) -> Option<Self> {
        hub.network_parameters.get(id)
    }

    fn store(hub: &ServiceHub, downloaded: &[Self]) -> FlowResult<()> {
        for parameters in downloaded {
            hub.network_parameters.save(parameters.clone())?;
        }
        Ok(())
    }
}

/// Items split by where they came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResult<T> {
    pub from_disk: Vec<T>,
    pub downloaded: Vec<T>,
}

/// Fetch `requests` from the counterparty of `session`.
pub struct FetchDataFlow<T: Fetchable> {
    requests: Vec<SecureHash>,
    session: FlowSession,
    config: ResolutionConfig,
    _marker: PhantomData<fn() -> T>,
}

pub type FetchTransactionsFlow = FetchDataFlow<SignedTransaction>;
pub type FetchAttachmentsFlow = FetchDataFlow<Attachment>;
pub type FetchNetworkParametersFlow = FetchDataFlow<NetworkParameters>;

impl<T: Fetchable> FetchDataFlow<T> {
    pub fn new(requests: impl IntoIterator<Item = SecureHash>, session: FlowSession) -> Self {
        let mut unique = Vec::new();
        for id in requests {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Self {
            requests: unique,
            session,
            config: ResolutionConfig::default(),
            _marker: PhantomData,
        }
    }

    pub fn with_config(mut self, config: ResolutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Check a response against what was asked for, position by position.
    fn validate(requested: &[SecureHash], response: Vec<T>) -> FlowResult<Vec<T>> {
        if response.len() != requested.len() {
            return Err(ResolutionError::DownloadedVsRequestedSizeMismatch {
                requested: requested.len(),
                got: response.len(),
            }
            .into_flow_error());
        }
        for (requested, item) in requested.iter().zip(&response) {
            let got = item.fetch_id()?;
            if &got != requested {
                return Err(ResolutionError::DownloadedVsRequestedDataMismatch {
                    requested: *requested,
                    got,
                }
                .into_flow_error());
            }
        }
        Ok(response)
    }
}

#[async_trait]
impl<T: Fetchable> FlowLogic for FetchDataFlow<T> {
    type Output = FetchResult<T>;

    fn name(&self) -> &'static str {
        T::FLOW_NAME
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<FetchResult<T>> {
        let hub = ctx.hub().clone();
        let mut from_disk = Vec::new();
        let mut to_fetch = Vec::new();
        for id in &self.requests {
            match T::load(&hub, id) {
                Some(item) => from_disk.push(item),
                None => to_fetch.push(*id),
            }
        }
        if to_fetch.is_empty() {
            return Ok(FetchResult {
                from_disk,
                downloaded: Vec::new(),
            });
        }

        let counterparty = &self.session.counterparty;
        debug!(
            counterparty = %counterparty,
            data_type = %T::DATA_TYPE,
            count = to_fetch.len(),
            "Requesting dependencies"
        );
        let batch = self
            .config
            .supports_batch_fetch(hub.network_map.platform_version(counterparty));
        let chunks: Vec<Vec<SecureHash>> = if batch {
            vec![to_fetch]
        } else {
            to_fetch.into_iter().map(|id| vec![id]).collect()
        };

        let mut downloaded = Vec::new();
        for chunk in chunks {
            let request = FetchRequest::Data {
                hashes: chunk.clone(),
                data_type: T::DATA_TYPE,
            };
            let response = ctx
                .send_and_receive::<Vec<T>, _>(&self.session, &request)
                .await?
                .unwrap(|items| Self::validate(&chunk, items))
                .inspect_err(|e| warn!(counterparty = %counterparty, error = %e, "Rejected fetch response"))?;
            downloaded.extend(response);
        }

        T::store(&hub, &downloaded)?;
        debug!(counterparty = %counterparty, count = downloaded.len(), "Fetched dependencies");
        Ok(FetchResult { from_disk, downloaded })
    }
}
