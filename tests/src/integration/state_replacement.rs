//! # Notary Change in Context
//!
//! A state moves from one notary to another, and later trades on it are
//! notarised by the new notary while the old one refuses the original.

#[cfg(test)]
mod tests {
    use crate::integration::common::{ledger, within};
    use lf_01_task_engine::ports::TransactionStorage;
    use lf_01_task_engine::test_utils::NotarySpec;
    use lf_01_task_engine::TransportableError;
    use lf_03_notarisation::NotaryException;
    use lf_05_state_replacement::StateReplacementInstigator;

    #[tokio::test]
    async fn test_trade_after_notary_change_uses_new_notary() {
        let l = ledger(&[
            NotarySpec::non_validating("OldNotary"),
            NotarySpec::validating("NewNotary"),
        ]);
        let original = l.joint_state(&l.notary(0), b"deed");

        let handle = l
            .alice
            .start_flow(StateReplacementInstigator::notary_change(original.clone(), l.notary(1)))
            .unwrap();
        let moved = within(handle.result()).await.unwrap();
        within(l.bob.transactions().wait_for_transaction(&moved.state_ref.txhash)).await;
        assert_eq!(moved.state.notary, l.notary(1));

        let proposal = l.joint_spend(&moved, b"deed, sold");
        let finalised = l.trade(&proposal).await.unwrap();

        assert!(finalised.is_signed_by(&l.notary(1).owning_key));
        assert_eq!(l.notaries[1].provider.consumed_by(&moved.state_ref), Some(proposal.id()));
        assert_eq!(l.notaries[0].provider.consumed_by(&moved.state_ref), None);
        // The validating new notary walked back through the notary change.
        let new_notary = l.network.notary_node(1).unwrap();
        assert!(new_notary.transactions().get(&original.state_ref.txhash).is_some());
    }

    #[tokio::test]
    async fn test_original_state_is_spent_at_old_notary() {
        let l = ledger(&[
            NotarySpec::non_validating("OldNotary"),
            NotarySpec::non_validating("NewNotary"),
        ]);
        let original = l.joint_state(&l.notary(0), b"deed");
        let handle = l
            .alice
            .start_flow(StateReplacementInstigator::notary_change(original.clone(), l.notary(1)))
            .unwrap();
        let moved = within(handle.result()).await.unwrap();

        let err = l
            .trade(&l.joint_spend(&original, b"deed, sold twice"))
            .await
            .unwrap_err();

        let refusal = NotaryException::from_flow_error(&err).expect("not a notary refusal");
        assert_eq!(
            refusal.conflicts().unwrap()[&original.state_ref].hash_of_transaction_id,
            moved.state_ref.txhash.rehash()
        );
    }
}
