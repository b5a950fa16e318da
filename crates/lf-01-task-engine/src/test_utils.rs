//! # Mock Network
//!
//! Several nodes in one process over an [`InMemoryNetwork`]. Keys are
//! derived from node names so runs are reproducible. Each node's stores
//! survive [`MockNode::restart`], which is how crash recovery is exercised.
//!
//! ```ignore
//! let mut network = MockNetwork::with_notaries(&[NotarySpec::non_validating("Notary")])?;
//! let alice = network.create_node("Alice")?;
//! let bob = network.create_node("Bob")?;
//! let handle = alice.start_flow(MyFlow { peer: bob.party.clone() })?;
//! ```

use crate::adapters::{
    AcceptAllVerifier, InMemoryAttachmentStorage, InMemoryCheckpointStorage, InMemoryDirectory,
    InMemoryKeyManagementService, InMemoryNetwork, InMemoryNetworkParametersStorage,
    InMemoryTransactionStorage, TestClock,
};
use crate::config::FlowConfig;
use crate::error::{FlowError, FlowResult};
use crate::manager::{FlowHandle, FlowManager, FlowRegistry};
use crate::ports::{FlowLogic, IdentityService, NetworkMapCache, TransactionVerifier};
use crate::services::ServiceHub;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_crypto::{sha256, Ed25519KeyPair};
use shared_types::{
    Command, ContractState, NetworkParameters, NotaryInfo, Party, SignedTransaction, StateAndRef,
    PublicKey, TransactionBuilder, TransactionState,
};
use std::sync::Arc;
use tracing::info;

/// A notary to create with the network.
#[derive(Clone, Debug)]
pub struct NotarySpec {
    pub name: String,
    pub validating: bool,
}

impl NotarySpec {
    pub fn non_validating(name: &str) -> Self {
        Self {
            name: name.to_string(),
            validating: false,
        }
    }

    pub fn validating(name: &str) -> Self {
        Self {
            name: name.to_string(),
            validating: true,
        }
    }
}

fn key_pair_for(name: &str) -> Ed25519KeyPair {
    Ed25519KeyPair::from_seed(sha256(name.as_bytes()))
}

/// Stores that outlive a node restart.
struct NodeStores {
    checkpoints: Arc<InMemoryCheckpointStorage>,
    transactions: Arc<InMemoryTransactionStorage>,
    attachments: Arc<InMemoryAttachmentStorage>,
    keys: Arc<InMemoryKeyManagementService>,
    parameters: Arc<InMemoryNetworkParametersStorage>,
    clock: Arc<TestClock>,
}

/// A set of in-process nodes sharing a network and a directory.
pub struct MockNetwork {
    network: Arc<InMemoryNetwork>,
    directory: Arc<InMemoryDirectory>,
    parameters: NetworkParameters,
    config: FlowConfig,
    verifier: Arc<dyn TransactionVerifier>,
    notaries: Vec<MockNode>,
}

impl MockNetwork {
    pub fn with_notaries(specs: &[NotarySpec]) -> FlowResult<Self> {
        let notary_parties: Vec<NotaryInfo> = specs
            .iter()
            .map(|spec| NotaryInfo {
                identity: Party::new(spec.name.as_str(), PublicKey::from(key_pair_for(&spec.name).public_key())),
                validating: spec.validating,
            })
            .collect();
        let mut network = Self {
            network: InMemoryNetwork::new(),
            directory: Arc::new(InMemoryDirectory::new()),
            parameters: NetworkParameters {
                minimum_platform_version: 1,
                notaries: notary_parties,
                max_transaction_size: 10 * 1024 * 1024,
                epoch: 1,
            },
            config: FlowConfig::default(),
            verifier: Arc::new(AcceptAllVerifier),
            notaries: Vec::new(),
        };
        for spec in specs {
            let node = network.create_node(&spec.name)?;
            network.notaries.push(node);
        }
        Ok(network)
    }

    /// Engine settings for nodes created from now on.
    pub fn set_flow_config(&mut self, config: FlowConfig) {
        self.config = config;
    }

    /// Contract verifier for nodes created from now on.
    pub fn set_verifier(&mut self, verifier: Arc<dyn TransactionVerifier>) {
        self.verifier = verifier;
    }

    pub fn parameters(&self) -> &NetworkParameters {
        &self.parameters
    }

    pub fn messaging(&self) -> &Arc<InMemoryNetwork> {
        &self.network
    }

    pub fn directory(&self) -> &Arc<InMemoryDirectory> {
        &self.directory
    }

    /// Identity of the `index`th notary.
    pub fn notary(&self, index: usize) -> Option<Party> {
        self.notaries.get(index).map(|n| n.party.clone())
    }

    pub fn notary_node(&self, index: usize) -> Option<&MockNode> {
        self.notaries.get(index)
    }

    pub fn notary_node_mut(&mut self, index: usize) -> Option<&mut MockNode> {
        self.notaries.get_mut(index)
    }

    pub fn create_node(&self, name: &str) -> FlowResult<MockNode> {
        let config = self.config.clone();
        self.create_node_with_config(name, config)
    }

    /// A node advertising `platform_version` instead of the current one.
    pub fn create_node_with_version(&self, name: &str, platform_version: u32) -> FlowResult<MockNode> {
        let config = FlowConfig {
            platform_version,
            ..self.config.clone()
        };
        self.create_node_with_config(name, config)
    }

    pub fn create_node_with_config(&self, name: &str, config: FlowConfig) -> FlowResult<MockNode> {
        let keys = Arc::new(InMemoryKeyManagementService::new());
        let key = keys.add(key_pair_for(name));
        let party = Party::new(name, key);
        self.directory.register_node(party.clone(), config.platform_version);

        let stores = NodeStores {
            checkpoints: Arc::new(InMemoryCheckpointStorage::new()),
            transactions: Arc::new(InMemoryTransactionStorage::new()),
            attachments: Arc::new(InMemoryAttachmentStorage::new()),
            keys,
            parameters: Arc::new(InMemoryNetworkParametersStorage::new(self.parameters.clone())?),
            clock: Arc::new(TestClock::new(Utc::now())),
        };
        let registry = FlowRegistry::new();
        let (hub, manager) = boot(&party, &config, &self.network, &self.directory, &self.verifier, &registry, &stores);
        let node = MockNode {
            party,
            config,
            network: self.network.clone(),
            directory: self.directory.clone(),
            verifier: self.verifier.clone(),
            registry,
            stores,
            hub,
            manager,
        };
        info!(node = name, "Mock node created");
        Ok(node)
    }
}

/// One in-process node.
pub struct MockNode {
    pub party: Party,
    config: FlowConfig,
    network: Arc<InMemoryNetwork>,
    directory: Arc<InMemoryDirectory>,
    verifier: Arc<dyn TransactionVerifier>,
    registry: Arc<FlowRegistry>,
    stores: NodeStores,
    hub: Arc<ServiceHub>,
    manager: FlowManager,
}

/// Wire a fresh engine over `stores`.
fn boot(
    party: &Party,
    config: &FlowConfig,
    network: &Arc<InMemoryNetwork>,
    directory: &Arc<InMemoryDirectory>,
    verifier: &Arc<dyn TransactionVerifier>,
    registry: &Arc<FlowRegistry>,
    stores: &NodeStores,
) -> (Arc<ServiceHub>, FlowManager) {
    let hub = Arc::new(ServiceHub {
        my_identity: party.clone(),
        config: config.clone(),
        messaging: network.attach(party),
        checkpoints: stores.checkpoints.clone(),
        transactions: stores.transactions.clone(),
        attachments: stores.attachments.clone(),
        identity: directory.clone(),
        keys: stores.keys.clone(),
        network_map: directory.clone(),
        network_parameters: stores.parameters.clone(),
        verifier: verifier.clone(),
        clock: stores.clock.clone(),
    });
    let manager = FlowManager::new(hub.clone(), registry.clone());
    manager.start();
    (hub, manager)
}

impl MockNode {
    pub fn services(&self) -> Arc<ServiceHub> {
        self.hub.clone()
    }

    pub fn manager(&self) -> &FlowManager {
        &self.manager
    }

    pub fn registry(&self) -> &Arc<FlowRegistry> {
        &self.registry
    }

    pub fn clock(&self) -> &Arc<TestClock> {
        &self.stores.clock
    }

    pub fn checkpoints(&self) -> &Arc<InMemoryCheckpointStorage> {
        &self.stores.checkpoints
    }

    pub fn transactions(&self) -> &Arc<InMemoryTransactionStorage> {
        &self.stores.transactions
    }

    pub fn attachments(&self) -> &Arc<InMemoryAttachmentStorage> {
        &self.stores.attachments
    }

    pub fn key_management(&self) -> &Arc<InMemoryKeyManagementService> {
        &self.stores.keys
    }

    pub fn network_parameters(&self) -> &Arc<InMemoryNetworkParametersStorage> {
        &self.stores.parameters
    }

    pub fn start_flow<F>(&self, flow: F) -> FlowResult<FlowHandle<F::Output>>
    where
        F: FlowLogic + Serialize + 'static,
        F::Output: Serialize + DeserializeOwned,
    {
        self.manager().start_flow(flow)
    }

    pub fn register_flow<F>(&self, name: &str)
    where
        F: FlowLogic + DeserializeOwned + 'static,
        F::Output: Serialize,
    {
        self.registry.register_flow::<F>(name);
    }

    pub fn register_responder<F, Fac>(&self, initiating_flow: &str, factory: Fac)
    where
        F: FlowLogic + 'static,
        F::Output: Serialize,
        Fac: Fn(crate::domain::FlowSession) -> F + Send + Sync + 'static,
    {
        self.registry.register_responder(initiating_flow, factory);
    }

    /// Stop every flow as a crash would. Stores are kept.
    pub fn stop(&self) {
        self.manager.shutdown();
    }

    /// Stop, boot a fresh engine over the same stores and resume every
    /// checkpointed flow. Returns how many were resumed.
    pub fn restart(&mut self) -> FlowResult<usize> {
        self.stop();
        let (hub, manager) = boot(
            &self.party,
            &self.config,
            &self.network,
            &self.directory,
            &self.verifier,
            &self.registry,
            &self.stores,
        );
        self.hub = hub;
        self.manager = manager;
        info!(node = %self.party, "Mock node restarted");
        self.manager().restore_flows()
    }

    /// Record `stxs` as if verified.
    pub fn record(&self, stxs: impl IntoIterator<Item = SignedTransaction>) -> usize {
        self.services().record_transactions(stxs)
    }

    /// Issue a state with `data` to `participants` under `notary`, signed
    /// by this node and recorded locally and at every other participant
    /// node in `others`.
    pub fn issue(
        &self,
        notary: &Party,
        data: &[u8],
        participants: Vec<Party>,
        others: &[&MockNode],
    ) -> FlowResult<StateAndRef> {
        let hub = self.services();
        let state = TransactionState::new(
            ContractState {
                participants,
                data: data.to_vec(),
            },
            "test.Contract",
            notary.clone(),
        );
        let tx = TransactionBuilder::new(Some(notary.clone()))
            .add_output(state)
            .add_command(Command::new("Issue", vec![self.party.owning_key.clone()]))
            .network_parameters(hub.network_parameters.current_hash())
            .build()?;
        let stx = hub.sign_initial_transaction(tx, None)?;
        let issued = stx.tx.out_ref(0).ok_or_else(|| FlowError::Internal("issued nothing".into()))?;
        self.record([stx.clone()]);
        for other in others {
            other.record([stx.clone()]);
        }
        Ok(issued)
    }

    /// Spend `input` into a new state with `data` for `participants`. The
    /// notary signature is applied directly by `notary` without running
    /// the notarisation protocol; the result is recorded here only.
    pub fn move_state(
        &self,
        input: &StateAndRef,
        data: &[u8],
        participants: Vec<Party>,
        notary: &MockNode,
    ) -> FlowResult<SignedTransaction> {
        let hub = self.services();
        let output = TransactionState::new(
            ContractState {
                participants,
                data: data.to_vec(),
            },
            input.state.contract.clone(),
            input.state.notary.clone(),
        );
        let tx = TransactionBuilder::new(None)
            .add_input_state(input)
            .add_output(output)
            .add_command(Command::new("Move", vec![self.party.owning_key.clone()]))
            .network_parameters(hub.network_parameters.current_hash())
            .build()?;
        let stx = hub.sign_initial_transaction(tx, None)?;
        let notary_hub = notary.services();
        let stx = notary_hub.add_signature(&stx, &notary_hub.legal_identity_key()?)?;
        self.record([stx.clone()]);
        Ok(stx)
    }

    /// Look up a party known to the shared directory.
    pub fn well_known_party(&self, name: &str) -> Option<Party> {
        self.directory.well_known_party(name)
    }

    pub fn platform_version_of(&self, party: &Party) -> Option<u32> {
        self.directory.platform_version(party)
    }
}

