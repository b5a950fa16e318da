//! Notary change and contract upgrade between mock nodes.

use crate::adapters::InMemoryUpgradeAuthorisations;
use crate::domain::{participant_keys, Modification, Proposal};
use crate::error::StateReplacementError;
use crate::flows::StateReplacementInstigator;
use crate::install_responders;
use crate::ports::UpgradeAuthorisationStore;
use async_trait::async_trait;
use lf_01_task_engine::ports::TransactionStorage;
use lf_01_task_engine::test_utils::{MockNetwork, MockNode, NotarySpec};
use lf_01_task_engine::{FlowContext, FlowError, FlowLogic, FlowResult, FlowSession, TransportableError};
use lf_02_dependency_resolution::{ReceiveTransactionFlow, SendTransactionFlow};
use lf_03_notarisation::{NotaryConfig, NotaryFlow, NotaryService};
use serde::{Deserialize, Serialize};
use shared_types::{
    Command, ContractState, Party, SignedTransaction, StateAndRef, TransactionBuilder, TransactionSignature,
    TransactionState,
};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// TEST FLOWS
// =============================================================================

#[derive(Serialize, Deserialize)]
struct Notarise {
    stx: SignedTransaction,
}

#[async_trait]
impl FlowLogic for Notarise {
    type Output = Vec<TransactionSignature>;

    fn name(&self) -> &'static str {
        "test.notarise"
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<Vec<TransactionSignature>> {
        ctx.sub_flow(NotaryFlow::new(self.stx.clone())).await
    }
}

/// Proposes a notary change but sends `stx` in place of the real
/// replacement.
#[derive(Serialize, Deserialize)]
struct DishonestInstigator {
    peer: Party,
    stx: SignedTransaction,
    proposal: Proposal,
}

#[async_trait]
impl FlowLogic for DishonestInstigator {
    type Output = Vec<TransactionSignature>;

    fn name(&self) -> &'static str {
        Modification::NOTARY_CHANGE
    }

    fn initiating(&self) -> bool {
        true
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<Vec<TransactionSignature>> {
        let session = ctx.initiate_flow(&self.peer)?;
        ctx.sub_flow(SendTransactionFlow::new(session.clone(), self.stx.clone()))
            .await?;
        Ok(ctx
            .send_and_receive::<Vec<TransactionSignature>, _>(&session, &self.proposal)
            .await?
            .into_inner())
    }
}

/// Acceptor that answers with two signatures instead of one.
struct DoubleSigner {
    session: FlowSession,
}

#[async_trait]
impl FlowLogic for DoubleSigner {
    type Output = ();

    fn name(&self) -> &'static str {
        "test.double-signer"
    }

    async fn call(&self, ctx: &mut FlowContext) -> FlowResult<()> {
        let stx = ctx
            .sub_flow(
                ReceiveTransactionFlow::new(self.session.clone())
                    .allowing_missing_signatures()
                    .without_recording(),
            )
            .await?
            .transaction;
        let _proposal = ctx.receive::<Proposal>(&self.session).await?;
        let hub = ctx.hub().clone();
        let signature = hub.create_signature(&stx, &hub.legal_identity_key()?)?;
        ctx.send(&self.session, &vec![signature.clone(), signature]).await?;
        ctx.receive::<Vec<TransactionSignature>>(&self.session).await?;
        Ok(())
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

struct Fixture {
    network: MockNetwork,
    alice: MockNode,
    bob: MockNode,
    carol: MockNode,
    bob_authorisations: Arc<InMemoryUpgradeAuthorisations>,
    notaries: Vec<Arc<NotaryService>>,
}

fn fixture() -> Fixture {
    ledger_telemetry::init_test_logging();
    let network = MockNetwork::with_notaries(&[
        NotarySpec::non_validating("Notary"),
        NotarySpec::non_validating("NewNotary"),
    ])
    .unwrap();
    let notaries = (0..2)
        .map(|i| {
            let node = network.notary_node(i).unwrap();
            NotaryService::install_on(&node.services(), node.registry(), NotaryConfig::default())
        })
        .collect();

    let alice = network.create_node("Alice").unwrap();
    let bob = network.create_node("Bob").unwrap();
    let carol = network.create_node("Carol").unwrap();
    install_responders(alice.registry(), Arc::new(InMemoryUpgradeAuthorisations::new()));
    let bob_authorisations = Arc::new(InMemoryUpgradeAuthorisations::new());
    install_responders(bob.registry(), bob_authorisations.clone());
    Fixture {
        network,
        alice,
        bob,
        carol,
        bob_authorisations,
        notaries,
    }
}

impl Fixture {
    fn old_notary(&self) -> Party {
        self.network.notary(0).unwrap()
    }

    fn new_notary(&self) -> Party {
        self.network.notary(1).unwrap()
    }

    /// A state shared by Alice and `other`, held by Alice only.
    fn shared_with(&self, other: &MockNode) -> StateAndRef {
        self.alice
            .issue(
                &self.old_notary(),
                b"asset",
                vec![self.alice.party.clone(), other.party.clone()],
                &[],
            )
            .unwrap()
    }
}

async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

async fn replace(node: &MockNode, flow: StateReplacementInstigator) -> FlowResult<StateAndRef> {
    let handle = node.start_flow(flow)?;
    within(handle.result()).await
}

fn replacement_error(err: &FlowError) -> StateReplacementError {
    StateReplacementError::from_flow_error(err).expect("not a state replacement error")
}

// =============================================================================
// NOTARY CHANGE
// =============================================================================

#[tokio::test]
async fn test_notary_change_moves_state_to_new_notary() {
    let f = fixture();
    let original = f.shared_with(&f.bob);

    let replaced = replace(
        &f.alice,
        StateReplacementInstigator::notary_change(original.clone(), f.new_notary()),
    )
    .await
    .unwrap();

    assert_eq!(replaced.state.notary, f.new_notary());
    assert_eq!(replaced.state.data, original.state.data);
    let tx_id = replaced.state_ref.txhash;
    let at_alice = f.alice.transactions().get(&tx_id).unwrap();
    at_alice.verify_required_signatures().unwrap();
    assert!(at_alice.is_signed_by(&f.old_notary().owning_key));
    let at_bob = within(f.bob.transactions().wait_for_transaction(&tx_id)).await;
    assert_eq!(at_bob.id(), tx_id);
    at_bob.verify_required_signatures().unwrap();
    assert_eq!(f.notaries[0].provider.consumed_by(&original.state_ref), Some(tx_id));
}

#[tokio::test]
async fn test_replaced_state_is_notarised_by_new_notary() {
    let f = fixture();
    let original = f.shared_with(&f.bob);
    let replaced = replace(
        &f.alice,
        StateReplacementInstigator::notary_change(original, f.new_notary()),
    )
    .await
    .unwrap();

    let hub = f.alice.services();
    let spend = TransactionBuilder::new(Some(f.new_notary()))
        .add_input_state(&replaced)
        .add_output(TransactionState::new(
            ContractState {
                participants: vec![f.alice.party.clone()],
                data: b"spent".to_vec(),
            },
            "test.Contract",
            f.new_notary(),
        ))
        .add_command(Command::new("Move", vec![f.alice.party.owning_key.clone()]))
        .network_parameters(hub.network_parameters.current_hash())
        .build()
        .unwrap();
    let spend = hub.sign_initial_transaction(spend, None).unwrap();

    let handle = f.alice.start_flow(Notarise { stx: spend.clone() }).unwrap();
    let signatures = within(handle.result()).await.unwrap();

    assert!(f.new_notary().owning_key.contains(&signatures[0].by));
    assert_eq!(f.notaries[1].provider.consumed_by(&replaced.state_ref), Some(spend.id()));
}

#[tokio::test]
async fn test_change_to_unknown_notary_is_refused_locally() {
    let f = fixture();
    let original = f.shared_with(&f.bob);

    let err = replace(
        &f.alice,
        StateReplacementInstigator::notary_change(original, f.carol.party.clone()),
    )
    .await
    .unwrap_err();

    assert_eq!(
        replacement_error(&err),
        StateReplacementError::UnknownNotary {
            notary: f.carol.party.to_string()
        }
    );
    assert!(f.network.messaging().delivered_where(|m| m.to == "Bob").is_empty());
}

#[tokio::test]
async fn test_change_to_current_notary_is_a_no_op_error() {
    let f = fixture();
    let original = f.shared_with(&f.bob);

    let err = replace(
        &f.alice,
        StateReplacementInstigator::notary_change(original.clone(), f.old_notary()),
    )
    .await
    .unwrap_err();

    assert_eq!(
        replacement_error(&err),
        StateReplacementError::NoModification {
            state_ref: original.state_ref
        }
    );
}

#[tokio::test]
async fn test_non_participant_cannot_instigate() {
    let f = fixture();
    let original = f.shared_with(&f.bob);

    let err = replace(
        &f.carol,
        StateReplacementInstigator::notary_change(original.clone(), f.new_notary()),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        replacement_error(&err),
        StateReplacementError::NotAParticipant { .. }
    ));
}

// =============================================================================
// CONTRACT UPGRADE
// =============================================================================

#[tokio::test]
async fn test_authorised_upgrade_succeeds() {
    let f = fixture();
    let original = f.shared_with(&f.bob);
    f.bob_authorisations
        .authorise(original.state_ref, "test.ContractV2".into());

    let upgraded = replace(
        &f.alice,
        StateReplacementInstigator::contract_upgrade(original.clone(), "test.ContractV2"),
    )
    .await
    .unwrap();

    assert_eq!(upgraded.state.contract, "test.ContractV2");
    assert_eq!(upgraded.state.notary, f.old_notary());
    within(f.bob.transactions().wait_for_transaction(&upgraded.state_ref.txhash)).await;
}

#[tokio::test]
async fn test_unauthorised_upgrade_is_refused_by_acceptor() {
    let f = fixture();
    let original = f.shared_with(&f.bob);

    let err = replace(
        &f.alice,
        StateReplacementInstigator::contract_upgrade(original.clone(), "test.ContractV2"),
    )
    .await
    .unwrap_err();

    assert_eq!(
        replacement_error(&err),
        StateReplacementError::UpgradeNotAuthorised {
            state_ref: original.state_ref,
            contract: "test.ContractV2".into()
        }
    );
    assert_eq!(f.notaries[0].provider.consumed_by(&original.state_ref), None);
}

#[tokio::test]
async fn test_upgrade_authorised_to_other_contract_is_refused() {
    let f = fixture();
    let original = f.shared_with(&f.bob);
    f.bob_authorisations
        .authorise(original.state_ref, "test.ContractV3".into());

    let err = replace(
        &f.alice,
        StateReplacementInstigator::contract_upgrade(original, "test.ContractV2"),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        replacement_error(&err),
        StateReplacementError::UpgradeNotAuthorised { .. }
    ));
}

// =============================================================================
// PROTOCOL CHECKS
// =============================================================================

#[tokio::test]
async fn test_acceptor_refuses_transaction_other_than_proposed() {
    let f = fixture();
    let original = f.shared_with(&f.bob);
    let mut tampered = original.state.clone();
    tampered.notary = f.new_notary();
    tampered.data.data = b"rewritten".to_vec();
    let hub = f.alice.services();
    let tx = TransactionBuilder::new(Some(f.old_notary()))
        .add_input_state(&original)
        .add_output(tampered)
        .add_command(Command::new("NotaryChange", participant_keys(&original.state)))
        .network_parameters(hub.network_parameters.current_hash())
        .build()
        .unwrap();
    let stx = hub.sign_initial_transaction(tx, None).unwrap();

    let handle = f
        .alice
        .start_flow(DishonestInstigator {
            peer: f.bob.party.clone(),
            stx,
            proposal: Proposal::new(
                original.state_ref,
                Modification::NotaryChange {
                    new_notary: f.new_notary(),
                },
            ),
        })
        .unwrap();
    let err = within(handle.result()).await.unwrap_err();

    assert!(matches!(
        replacement_error(&err),
        StateReplacementError::ProposalRejected { .. }
    ));
}

#[tokio::test]
async fn test_more_than_one_signature_per_participant_is_rejected() {
    let f = fixture();
    f.carol
        .register_responder(Modification::NOTARY_CHANGE, |session| DoubleSigner { session });
    let original = f.shared_with(&f.carol);

    let err = replace(
        &f.alice,
        StateReplacementInstigator::notary_change(original.clone(), f.new_notary()),
    )
    .await
    .unwrap_err();

    assert_eq!(
        replacement_error(&err),
        StateReplacementError::WrongSignatureCount {
            party: f.carol.party.to_string(),
            got: 2
        }
    );
    assert_eq!(f.notaries[0].provider.consumed_by(&original.state_ref), None);
}
