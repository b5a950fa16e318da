//! # Checkpoint Restart
//!
//! Alice's trade is checkpointed while it waits for Bob, her node
//! restarts, and the resumed run finishes exactly as an uninterrupted one
//! would, without sending anything twice.

#[cfg(test)]
mod tests {
    use crate::integration::common::{accept_all, ledger, within, Ledger, Trade, TRADE};
    use async_trait::async_trait;
    use lf_01_task_engine::ports::{CheckpointStorage, TransactionStorage};
    use lf_01_task_engine::test_utils::NotarySpec;
    use lf_01_task_engine::{FlowContext, FlowLogic, FlowResult, FlowSession, SuspensionKind};
    use lf_04_finality::SignTransactionFlow;
    use shared_types::SignedTransaction;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Bob's signer, held back until the gate opens.
    struct GatedSigner {
        session: FlowSession,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl FlowLogic for GatedSigner {
        type Output = SignedTransaction;

        fn name(&self) -> &'static str {
            "it.gated-signer"
        }

        async fn call(&self, ctx: &mut FlowContext) -> FlowResult<SignedTransaction> {
            self.gate.notified().await;
            ctx.sub_flow(SignTransactionFlow::new(self.session.clone(), accept_all()))
                .await
        }
    }

    fn messages_to_bob(l: &Ledger) -> Vec<(String, u64)> {
        l.network
            .messaging()
            .delivered_where(|m| m.to == "Bob")
            .into_iter()
            .map(|m| (m.message.recipient.0.to_string(), m.message.seq))
            .collect()
    }

    #[tokio::test]
    async fn test_trade_survives_initiator_restart() {
        let mut l = ledger(&[NotarySpec::non_validating("Notary")]);
        let gate = Arc::new(Notify::new());
        {
            let gate = gate.clone();
            l.bob.register_responder(TRADE, move |session| GatedSigner {
                session,
                gate: gate.clone(),
            });
        }
        let notary = l.notary(0);
        let state = l.joint_state(&notary, b"bond");
        let proposal = l.joint_spend(&state, b"bond, transferred");

        let handle = l
            .alice
            .start_flow(Trade {
                stx: proposal.clone(),
                counterparty: l.bob.party.clone(),
            })
            .unwrap();
        let run_id = handle.run_id;

        // Sent the transaction, waiting for Bob's first fetch request.
        within(async {
            loop {
                if let Some(c) = l.alice.checkpoints().get(&run_id).unwrap() {
                    if matches!(c.pending, Some(SuspensionKind::Receive { .. })) {
                        break;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;

        assert_eq!(l.alice.restart().unwrap(), 1);
        gate.notify_one();

        let resumed = l.alice.manager().track::<SignedTransaction>(run_id).unwrap();
        let finalised = within(resumed.result()).await.unwrap();

        assert_eq!(finalised.id(), proposal.id());
        finalised.verify_required_signatures().unwrap();
        let at_bob = within(l.bob.transactions().wait_for_transaction(&proposal.id())).await;
        assert_eq!(at_bob, finalised);
        assert_eq!(l.notaries[0].provider.consumed_by(&state.state_ref), Some(proposal.id()));

        let sent = messages_to_bob(&l);
        let unique: HashSet<_> = sent.iter().cloned().collect();
        assert_eq!(unique.len(), sent.len(), "a message was sent twice");

        // Same trade on a fresh ledger, uninterrupted.
        let reference = ledger(&[NotarySpec::non_validating("Notary")]);
        let state = reference.joint_state(&reference.notary(0), b"bond");
        let uninterrupted = reference
            .trade(&reference.joint_spend(&state, b"bond, transferred"))
            .await
            .unwrap();
        within(reference.bob.transactions().wait_for_transaction(&uninterrupted.id())).await;

        assert_eq!(uninterrupted.id(), finalised.id());
        assert_eq!(messages_to_bob(&reference).len(), sent.len());
    }
}
