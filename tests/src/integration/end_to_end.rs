//! # End-to-End Finality
//!
//! Alice spends a state she shares with Bob: Bob resolves and signs, the
//! notary commits the input, and both end up holding the same final
//! transaction.

#[cfg(test)]
mod tests {
    use crate::integration::common::{ledger, within};
    use lf_01_task_engine::ports::TransactionStorage;
    use lf_01_task_engine::test_utils::NotarySpec;

    #[tokio::test]
    async fn test_trade_with_non_validating_notary() {
        let l = ledger(&[NotarySpec::non_validating("Notary")]);
        let notary = l.notary(0);
        let state = l.joint_state(&notary, b"100 GBP");
        let proposal = l.joint_spend(&state, b"100 GBP, paid");

        let finalised = l.trade(&proposal).await.unwrap();

        assert_eq!(finalised.id(), proposal.id());
        finalised.verify_required_signatures().unwrap();
        for key in [&l.alice.party.owning_key, &l.bob.party.owning_key, &notary.owning_key] {
            assert!(finalised.is_signed_by(key));
        }
        assert_eq!(l.alice.transactions().get(&proposal.id()), Some(finalised.clone()));
        let at_bob = within(l.bob.transactions().wait_for_transaction(&proposal.id())).await;
        assert_eq!(at_bob, finalised);
        // Bob resolved the issuance while signing.
        assert!(l.bob.transactions().get(&state.state_ref.txhash).is_some());

        let provider = &l.notaries[0].provider;
        assert_eq!(provider.consumed_by(&state.state_ref), Some(proposal.id()));
        let log = provider.request_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].tx_id, proposal.id());
        assert!(log[0].accepted);
    }

    #[tokio::test]
    async fn test_trade_with_validating_notary() {
        let l = ledger(&[NotarySpec::validating("Notary")]);
        let notary = l.notary(0);
        let state = l.joint_state(&notary, b"100 GBP");
        let proposal = l.joint_spend(&state, b"100 GBP, paid");

        let finalised = l.trade(&proposal).await.unwrap();

        assert!(finalised.is_signed_by(&notary.owning_key));
        // The validating notary resolved the backchain itself.
        let notary_node = l.network.notary_node(0).unwrap();
        assert!(notary_node.transactions().get(&state.state_ref.txhash).is_some());
        within(l.bob.transactions().wait_for_transaction(&proposal.id())).await;
    }

    #[tokio::test]
    async fn test_chained_trades_resolve_growing_backchain() {
        let l = ledger(&[NotarySpec::non_validating("Notary")]);
        let notary = l.notary(0);
        let mut state = l.joint_state(&notary, b"v0");

        for round in 1..=3u8 {
            let proposal = l.joint_spend(&state, &[b'v', b'0' + round]);
            let finalised = l.trade(&proposal).await.unwrap();
            within(l.bob.transactions().wait_for_transaction(&finalised.id())).await;
            state = finalised.tx.out_ref(0).unwrap();
        }

        assert_eq!(state.state.data.data, b"v3".to_vec());
        assert_eq!(l.notaries[0].provider.request_log().len(), 3);
    }
}
