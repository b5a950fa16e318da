//! # Double Spend
//!
//! Two fully signed transactions spend the same state and are finalised
//! at once. The notary lets exactly one through and hands the other a
//! signed conflict naming the winner.

#[cfg(test)]
mod tests {
    use crate::integration::common::{ledger, within, Trade};
    use lf_01_task_engine::ports::TransactionStorage;
    use lf_01_task_engine::test_utils::NotarySpec;
    use lf_01_task_engine::TransportableError;
    use lf_03_notarisation::{ConsumedStateType, NotaryException};

    #[tokio::test]
    async fn test_concurrent_spends_have_one_winner() {
        let l = ledger(&[NotarySpec::non_validating("Notary")]);
        let notary = l.notary(0);
        let state = l.joint_state(&notary, b"ticket");
        let to_carol = l.joint_spend(&state, b"ticket for Carol");
        let to_dave = l.joint_spend(&state, b"ticket for Dave");

        let first = l
            .alice
            .start_flow(Trade {
                stx: to_carol.clone(),
                counterparty: l.bob.party.clone(),
            })
            .unwrap();
        let second = l
            .alice
            .start_flow(Trade {
                stx: to_dave.clone(),
                counterparty: l.bob.party.clone(),
            })
            .unwrap();
        let (first, second) = within(async { tokio::join!(first.result(), second.result()) }).await;

        let (winner, loser, err) = match (first, second) {
            (Ok(_), Err(err)) => (to_carol, to_dave, err),
            (Err(err), Ok(_)) => (to_dave, to_carol, err),
            (a, b) => panic!("expected exactly one winner, got {:?} and {:?}", a.is_ok(), b.is_ok()),
        };

        let refusal = NotaryException::from_flow_error(&err).expect("not a notary refusal");
        assert_eq!(refusal.tx_id, loser.id());
        let conflicts = refusal.conflicts().unwrap();
        let details = &conflicts[&state.state_ref];
        assert_eq!(details.hash_of_transaction_id, winner.id().rehash());
        assert_eq!(details.kind, ConsumedStateType::InputState);
        refusal.evidence.clone().unwrap().verified().unwrap();

        assert_eq!(l.notaries[0].provider.consumed_by(&state.state_ref), Some(winner.id()));
        assert!(l.alice.transactions().get(&loser.id()).is_none());
        within(l.bob.transactions().wait_for_transaction(&winner.id())).await;
        assert!(l.bob.transactions().get(&loser.id()).is_none());
    }

    #[tokio::test]
    async fn test_spending_an_already_spent_state_is_refused() {
        let l = ledger(&[NotarySpec::non_validating("Notary")]);
        let notary = l.notary(0);
        let state = l.joint_state(&notary, b"ticket");
        let first = l.joint_spend(&state, b"ticket for Carol");
        let second = l.joint_spend(&state, b"ticket for Dave");

        l.trade(&first).await.unwrap();
        let err = l.trade(&second).await.unwrap_err();

        let refusal = NotaryException::from_flow_error(&err).expect("not a notary refusal");
        assert_eq!(
            refusal.conflicts().unwrap()[&state.state_ref].hash_of_transaction_id,
            first.id().rehash()
        );
    }
}
