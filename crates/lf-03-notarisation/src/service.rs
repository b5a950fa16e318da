//! # Notary Service
//!
//! Binds a notary identity, its configuration and a uniqueness provider,
//! and installs [`NotaryServiceFlow`] as the responder to
//! [`NotaryFlow`] on the notary node.

use crate::adapters::BatchingUniquenessProvider;
use crate::config::NotaryConfig;
use crate::flows::{NotaryFlow, NotaryServiceFlow};
use crate::ports::UniquenessProvider;
use lf_01_task_engine::{FlowRegistry, ServiceHub};
use shared_types::Party;
use std::sync::Arc;
use tracing::info;

pub struct NotaryService {
    pub identity: Party,
    pub config: NotaryConfig,
    pub provider: Arc<dyn UniquenessProvider>,
}

impl NotaryService {
    pub fn new(identity: Party, config: NotaryConfig, provider: Arc<dyn UniquenessProvider>) -> Arc<Self> {
        Arc::new(Self {
            identity,
            config,
            provider,
        })
    }

    /// A service for `hub`'s identity over a fresh in-memory provider
    /// using the node clock.
    pub fn with_batching_provider(hub: &ServiceHub, config: NotaryConfig) -> Arc<Self> {
        let provider = BatchingUniquenessProvider::new(&config, hub.clock.clone());
        Self::new(hub.my_identity.clone(), config, provider)
    }

    /// Answer [`NotaryFlow`] sessions arriving at this node.
    pub fn install(self: &Arc<Self>, registry: &FlowRegistry) {
        let service = self.clone();
        registry.register_responder(NotaryFlow::NAME, move |session| {
            NotaryServiceFlow::new(session, service.clone())
        });
        info!(
            notary = %self.identity,
            validating = self.config.validating,
            "Notary service installed"
        );
    }

    /// Build a batching service for `hub` and install it in `registry`.
    pub fn install_on(hub: &ServiceHub, registry: &FlowRegistry, config: NotaryConfig) -> Arc<Self> {
        let service = Self::with_batching_provider(hub, config);
        service.install(registry);
        service
    }
}

impl std::fmt::Debug for NotaryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotaryService")
            .field("identity", &self.identity.name)
            .field("validating", &self.config.validating)
            .finish()
    }
}
