//! Shared fixture: a network with one or more notaries running the
//! notary service and two trading parties with every responder installed.

use async_trait::async_trait;
use lf_01_task_engine::test_utils::{MockNetwork, MockNode, NotarySpec};
use lf_01_task_engine::{FlowContext, FlowLogic, FlowResult};
use lf_03_notarisation::{NotaryConfig, NotaryService};
use lf_04_finality::{CollectSignaturesFlow, FinalityFlow, SignTransactionFlow, TransactionChecker};
use lf_05_state_replacement::InMemoryUpgradeAuthorisations;
use serde::{Deserialize, Serialize};
use shared_types::{
    Command, ContractState, Party, SignedTransaction, StateAndRef, TransactionBuilder, TransactionState,
};
use std::sync::Arc;
use std::time::Duration;

pub const TRADE: &str = "it.trade";

/// Collect signatures from `counterparty`, then finalise.
#[derive(Serialize, Deserialize)]
pub struct Trade {
    pub stx: SignedTransaction,
    pub counterparty: Party,
}

#[async_trait]
impl FlowLogic for Trade {
    type Output = SignedTransaction;

    fn name(&self) -> &'static str {
        TRADE
    }

    fn initiating(&self) -> bool {
        true
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<SignedTransaction> {
        let session = ctx.initiate_flow(&self.counterparty)?;
        let signed = ctx
            .sub_flow(CollectSignaturesFlow::new(self.stx.clone(), vec![session]))
            .await?;
        ctx.sub_flow(FinalityFlow::new(signed)).await
    }
}

pub fn accept_all() -> Arc<dyn TransactionChecker> {
    Arc::new(|_: &SignedTransaction| -> Result<(), String> { Ok(()) })
}

pub struct Ledger {
    pub network: MockNetwork,
    pub notaries: Vec<Arc<NotaryService>>,
    pub alice: MockNode,
    pub bob: MockNode,
}

/// Install the notary service on every notary in `specs`, and on the
/// parties the finality and state replacement responders. Bob signs
/// trades without objection.
pub fn ledger(specs: &[NotarySpec]) -> Ledger {
    ledger_telemetry::init_test_logging();
    let network = MockNetwork::with_notaries(specs).unwrap();
    let notaries = specs
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let node = network.notary_node(i).unwrap();
            let config = if spec.validating {
                NotaryConfig::validating()
            } else {
                NotaryConfig::default()
            };
            NotaryService::install_on(&node.services(), node.registry(), config)
        })
        .collect();

    let alice = network.create_node("Alice").unwrap();
    let bob = network.create_node("Bob").unwrap();
    for node in [&alice, &bob] {
        lf_04_finality::install_responders(node.registry());
        lf_05_state_replacement::install_responders(
            node.registry(),
            Arc::new(InMemoryUpgradeAuthorisations::new()),
        );
    }
    alice.register_flow::<Trade>(TRADE);
    let checker = accept_all();
    bob.register_responder(TRADE, move |session| SignTransactionFlow::new(session, checker.clone()));
    Ledger {
        network,
        notaries,
        alice,
        bob,
    }
}

impl Ledger {
    pub fn notary(&self, index: usize) -> Party {
        self.network.notary(index).unwrap()
    }

    /// A state owned jointly by Alice and Bob, issued and held by Alice.
    pub fn joint_state(&self, notary: &Party, data: &[u8]) -> StateAndRef {
        self.alice
            .issue(notary, data, vec![self.alice.party.clone(), self.bob.party.clone()], &[])
            .unwrap()
    }

    /// Alice's proposal to move `input` into `data`, needing Bob's
    /// signature too. Signed by Alice only.
    pub fn joint_spend(&self, input: &StateAndRef, data: &[u8]) -> SignedTransaction {
        let hub = self.alice.services();
        let tx = TransactionBuilder::new(Some(input.state.notary.clone()))
            .add_input_state(input)
            .add_output(TransactionState::new(
                ContractState {
                    participants: vec![self.alice.party.clone(), self.bob.party.clone()],
                    data: data.to_vec(),
                },
                input.state.contract.clone(),
                input.state.notary.clone(),
            ))
            .add_command(Command::new(
                "Move",
                vec![self.alice.party.owning_key.clone(), self.bob.party.owning_key.clone()],
            ))
            .network_parameters(hub.network_parameters.current_hash())
            .build()
            .unwrap();
        hub.sign_initial_transaction(tx, None).unwrap()
    }

    pub async fn trade(&self, stx: &SignedTransaction) -> FlowResult<SignedTransaction> {
        let handle = self.alice.start_flow(Trade {
            stx: stx.clone(),
            counterparty: self.bob.party.clone(),
        })?;
        within(handle.result()).await
    }
}

pub async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("timed out")
}
