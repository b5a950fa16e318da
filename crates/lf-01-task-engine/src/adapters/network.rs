//! # In-Memory Network
//!
//! A process-local transport connecting any number of nodes by name.
//!
//! ```text
//!   NodeMessaging(A) ──send──▶ InMemoryNetwork ──▶ Mailbox(B)
//!                                                  ├── inbox[S1]: seq → msg, acked
//!                                                  ├── inbox[S2]: ...
//!                                                  └── pending inits
//! ```
//!
//! Mailboxes outlive the [`NodeMessaging`] handles attached to them, which
//! makes them behave like durable queues across a node restart:
//! unacknowledged messages, including session inits, are redelivered to the
//! next handle. A message at or below an inbox's acknowledged sequence is
//! dropped on arrival.

use crate::domain::{MessageBody, SessionId, SessionMessage};
use crate::error::{FlowError, FlowResult};
use crate::ports::MessagingService;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::Party;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, trace};

#[derive(Default)]
struct Inbox {
    messages: BTreeMap<u64, SessionMessage>,
    acked: Option<u64>,
}

impl Inbox {
    fn is_acked(&self, seq: u64) -> bool {
        self.acked.is_some_and(|a| seq <= a)
    }
}

#[derive(Default)]
struct Mailbox {
    inboxes: Mutex<HashMap<SessionId, Inbox>>,
    /// Unacknowledged session inits in arrival order.
    inits: Mutex<Vec<SessionId>>,
    arrived: Notify,
}

impl Mailbox {
    fn deliver(&self, message: SessionMessage) {
        let recipient = message.recipient;
        let is_init = matches!(message.body, MessageBody::Init { .. });
        {
            let mut inboxes = self.inboxes.lock();
            let inbox = inboxes.entry(recipient).or_default();
            if inbox.is_acked(message.seq) || inbox.messages.contains_key(&message.seq) {
                trace!(session = %recipient, seq = message.seq, "Duplicate message dropped");
                return;
            }
            inbox.messages.insert(message.seq, message);
        }
        if is_init {
            self.inits.lock().push(recipient);
        }
        self.arrived.notify_waiters();
    }

    fn take(&self, session: &SessionId, seq: u64) -> Option<SessionMessage> {
        self.inboxes
            .lock()
            .get(session)
            .and_then(|inbox| inbox.messages.get(&seq).cloned())
    }

    fn acknowledge(&self, session: SessionId, seq: u64) {
        {
            let mut inboxes = self.inboxes.lock();
            let inbox = inboxes.entry(session).or_default();
            if inbox.is_acked(seq) {
                return;
            }
            inbox.acked = Some(seq);
            inbox.messages.retain(|s, _| *s > seq);
        }
        self.inits.lock().retain(|s| *s != session);
    }
}

/// One copy of every message that reached a mailbox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub from: String,
    pub to: String,
    pub message: SessionMessage,
}

/// Process-local network of mailboxes.
#[derive(Default)]
pub struct InMemoryNetwork {
    mailboxes: RwLock<HashMap<String, Arc<Mailbox>>>,
    blocked: RwLock<HashSet<String>>,
    delivered: Mutex<Vec<DeliveredMessage>>,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Messaging handle for `party`. The mailbox is created on first
    /// attach and reused by later handles.
    pub fn attach(self: &Arc<Self>, party: &Party) -> Arc<NodeMessaging> {
        let mailbox = self
            .mailboxes
            .write()
            .entry(party.name.clone())
            .or_default()
            .clone();
        Arc::new(NodeMessaging {
            network: self.clone(),
            party: party.clone(),
            mailbox,
            dispatched: Mutex::new(HashSet::new()),
        })
    }

    /// Silently drop every message sent to `party` until unblocked.
    pub fn block(&self, party: &Party) {
        self.blocked.write().insert(party.name.clone());
    }

    pub fn unblock(&self, party: &Party) {
        self.blocked.write().remove(&party.name);
    }

    pub fn delivered(&self) -> Vec<DeliveredMessage> {
        self.delivered.lock().clone()
    }

    /// Delivered messages matching `filter`.
    pub fn delivered_where(&self, filter: impl Fn(&DeliveredMessage) -> bool) -> Vec<DeliveredMessage> {
        self.delivered.lock().iter().filter(|m| filter(m)).cloned().collect()
    }

    fn route(&self, from: &Party, to: &Party, message: SessionMessage) -> FlowResult<()> {
        if self.blocked.read().contains(&to.name) {
            debug!(from = %from, to = %to, seq = message.seq, "Message dropped: recipient blocked");
            return Ok(());
        }
        let mailbox = self
            .mailboxes
            .read()
            .get(&to.name)
            .cloned()
            .ok_or_else(|| FlowError::Messaging(format!("unknown recipient {to}")))?;
        self.delivered.lock().push(DeliveredMessage {
            from: from.name.clone(),
            to: to.name.clone(),
            message: message.clone(),
        });
        mailbox.deliver(message);
        Ok(())
    }
}

/// One node's attachment to an [`InMemoryNetwork`].
pub struct NodeMessaging {
    network: Arc<InMemoryNetwork>,
    party: Party,
    mailbox: Arc<Mailbox>,
    /// Inits already handed out by this handle.
    dispatched: Mutex<HashSet<SessionId>>,
}

impl NodeMessaging {
    pub fn party(&self) -> &Party {
        &self.party
    }
}

#[async_trait]
impl MessagingService for NodeMessaging {
    async fn send(&self, to: &Party, message: SessionMessage) -> FlowResult<()> {
        self.network.route(&self.party, to, message)
    }

    async fn receive(&self, session: SessionId, seq: u64) -> FlowResult<SessionMessage> {
        loop {
            let notified = self.mailbox.arrived.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(message) = self.mailbox.take(&session, seq) {
                return Ok(message);
            }
            notified.await;
        }
    }

    fn acknowledge(&self, session: SessionId, seq: u64) {
        self.mailbox.acknowledge(session, seq);
    }

    async fn next_session_init(&self) -> SessionMessage {
        loop {
            let notified = self.mailbox.arrived.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let pending: Vec<SessionId> = self.mailbox.inits.lock().clone();
            for session in pending {
                if !self.dispatched.lock().insert(session) {
                    continue;
                }
                if let Some(init) = self.mailbox.take(&session, 0) {
                    return init;
                }
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FlowInfo, Payload};
    use shared_crypto::Ed25519KeyPair;
    use shared_types::PublicKey;
    use std::time::Duration;

    fn party(name: &str) -> Party {
        Party::new(name, PublicKey::from(Ed25519KeyPair::generate().public_key()))
    }

    fn data(recipient: SessionId, sender: &Party, seq: u64) -> SessionMessage {
        SessionMessage {
            recipient,
            sender: sender.clone(),
            seq,
            body: MessageBody::Data(Payload::encode(&seq).unwrap()),
        }
    }

    fn init(recipient: SessionId, sender: &Party) -> SessionMessage {
        SessionMessage {
            recipient,
            sender: sender.clone(),
            seq: 0,
            body: MessageBody::Init {
                initiating_flow: "ping".into(),
                initiator_session: SessionId(uuid::Uuid::new_v4()),
                flow_info: FlowInfo {
                    flow_version: 1,
                    app_name: "test".into(),
                },
            },
        }
    }

    #[tokio::test]
    async fn test_messages_delivered_by_sequence() {
        let network = InMemoryNetwork::new();
        let (alice, bob) = (party("Alice"), party("Bob"));
        let a = network.attach(&alice);
        let b = network.attach(&bob);
        let session = SessionId(uuid::Uuid::new_v4());

        a.send(&bob, data(session, &alice, 2)).await.unwrap();
        a.send(&bob, data(session, &alice, 1)).await.unwrap();

        assert_eq!(b.receive(session, 1).await.unwrap().seq, 1);
        assert_eq!(b.receive(session, 2).await.unwrap().seq, 2);
    }

    #[tokio::test]
    async fn test_acknowledged_messages_are_dropped_on_redelivery() {
        let network = InMemoryNetwork::new();
        let (alice, bob) = (party("Alice"), party("Bob"));
        let a = network.attach(&alice);
        let b = network.attach(&bob);
        let session = SessionId(uuid::Uuid::new_v4());

        a.send(&bob, data(session, &alice, 1)).await.unwrap();
        b.receive(session, 1).await.unwrap();
        b.acknowledge(session, 1);
        a.send(&bob, data(session, &alice, 1)).await.unwrap();

        let again = tokio::time::timeout(Duration::from_millis(50), b.receive(session, 1)).await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn test_unacknowledged_init_redelivered_to_new_handle() {
        let network = InMemoryNetwork::new();
        let (alice, bob) = (party("Alice"), party("Bob"));
        let a = network.attach(&alice);
        let b = network.attach(&bob);
        let session = SessionId(uuid::Uuid::new_v4());

        a.send(&bob, init(session, &alice)).await.unwrap();
        assert_eq!(b.next_session_init().await.recipient, session);

        let restarted = network.attach(&bob);
        assert_eq!(restarted.next_session_init().await.recipient, session);

        restarted.acknowledge(session, 0);
        let after_ack = network.attach(&bob);
        let none = tokio::time::timeout(Duration::from_millis(50), after_ack.next_session_init()).await;
        assert!(none.is_err());
    }

    #[tokio::test]
    async fn test_blocked_party_receives_nothing() {
        let network = InMemoryNetwork::new();
        let (alice, bob) = (party("Alice"), party("Bob"));
        let a = network.attach(&alice);
        let b = network.attach(&bob);
        let session = SessionId(uuid::Uuid::new_v4());

        network.block(&bob);
        a.send(&bob, data(session, &alice, 1)).await.unwrap();
        assert!(tokio::time::timeout(Duration::from_millis(50), b.receive(session, 1))
            .await
            .is_err());

        network.unblock(&bob);
        a.send(&bob, data(session, &alice, 1)).await.unwrap();
        assert_eq!(b.receive(session, 1).await.unwrap().seq, 1);
    }

    #[tokio::test]
    async fn test_unknown_recipient_is_an_error() {
        let network = InMemoryNetwork::new();
        let alice = party("Alice");
        let a = network.attach(&alice);
        let err = a
            .send(&party("Nobody"), data(SessionId(uuid::Uuid::new_v4()), &alice, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Messaging(_)));
    }
}
