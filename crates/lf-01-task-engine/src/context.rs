//! # Flow Context
//!
//! The API a running flow uses to talk to the world. Every blocking
//! operation here is a suspension point:
//!
//! | Operation | Journal entry |
//! |-----------|---------------|
//! | [`FlowContext::send`] | `Send` |
//! | [`FlowContext::receive`] | `Receive` |
//! | [`FlowContext::send_and_receive_with_retry`] | `Send` + `ReceiveWithTimeout` (+ `Sleep` per retry) |
//! | [`FlowContext::close_sessions`] | `Send` per open session |
//! | [`FlowContext::sleep`] | `Sleep` |
//! | [`FlowContext::wait_for_ledger_commit`] | `WaitForLedgerCommit` |
//! | [`FlowContext::execute_async`] | `ExecuteAsync` |
//!
//! While the journal has entries left the context is replaying: outcomes
//! come from the journal and nothing is transmitted. Session bookkeeping
//! (sequence numbers, end flags) runs identically in both modes so that the
//! live continuation picks up exactly where the previous process stopped.

use crate::domain::{
    Checkpoint, FlowInfo, FlowSession, FlowStart, FlowStatus, IoOutcome, JournalEntry,
    MessageBody, Payload, ProgressTracker, RunId, SessionId, SessionMessage, SessionRecord,
    SuspensionKind, UntrustworthyData,
};
use crate::error::{ErrorId, FlowError, FlowResult};
use crate::ports::{FlowExternalOperation, FlowLogic};
use crate::services::ServiceHub;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{encoding, Party, SecureHash, SignedTransaction};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// One level of the sub-flow stack.
struct Frame {
    name: &'static str,
    initiating: bool,
    version: u32,
    namespace: u32,
    tracker: Option<ProgressTracker>,
}

/// Execution context of one flow run, shared by all its sub-flows.
pub struct FlowContext {
    hub: Arc<ServiceHub>,
    checkpoint: Checkpoint,
    /// Next journal entry to replay; equals the journal length once live.
    cursor: usize,
    sessions: BTreeMap<SessionId, SessionRecord>,
    session_counter: u64,
    frames: Vec<Frame>,
    next_namespace: u32,
    kill: watch::Receiver<bool>,
}

impl FlowContext {
    pub(crate) fn new(hub: Arc<ServiceHub>, checkpoint: Checkpoint, kill: watch::Receiver<bool>) -> Self {
        let mut sessions = BTreeMap::new();
        if let FlowStart::Initiated {
            initiating_flow,
            local,
            initiator_session,
            counterparty,
            flow_info,
        } = &checkpoint.start
        {
            sessions.insert(
                *local,
                SessionRecord::accepted(
                    *local,
                    *initiator_session,
                    counterparty.clone(),
                    initiating_flow,
                    flow_info.clone(),
                ),
            );
        }
        Self {
            hub,
            checkpoint,
            cursor: 0,
            sessions,
            session_counter: 0,
            frames: Vec::new(),
            next_namespace: 1,
            kill,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn run_id(&self) -> RunId {
        self.checkpoint.run_id
    }

    pub fn hub(&self) -> &Arc<ServiceHub> {
        &self.hub
    }

    pub fn our_identity(&self) -> &Party {
        &self.hub.my_identity
    }

    /// Whether outcomes are currently served from the journal.
    pub fn is_replaying(&self) -> bool {
        self.cursor < self.checkpoint.journal.len()
    }

    /// Flow info the initiator sent, for sessions we accepted.
    pub fn counterparty_flow_info(&self, session: &FlowSession) -> Option<FlowInfo> {
        self.sessions
            .get(&session.local)
            .and_then(|r| r.counterparty_flow_info.clone())
    }

    pub fn check_not_killed(&self) -> FlowResult<()> {
        if *self.kill.borrow() {
            return Err(self.killed());
        }
        Ok(())
    }

    fn killed(&self) -> FlowError {
        FlowError::Killed {
            run_id: self.run_id().to_string(),
        }
    }

    // =========================================================================
    // SUB-FLOWS
    // =========================================================================

    /// Run `flow` to completion inside this run, with its own session
    /// namespace.
    pub async fn sub_flow<F: FlowLogic>(&mut self, flow: F) -> FlowResult<F::Output> {
        self.enter(&flow, false).await
    }

    /// Like [`FlowContext::sub_flow`], but the child sees the sessions the
    /// parent opened by party.
    pub async fn sub_flow_sharing_sessions<F: FlowLogic>(&mut self, flow: F) -> FlowResult<F::Output> {
        self.enter(&flow, true).await
    }

    async fn enter<F: FlowLogic>(&mut self, flow: &F, share_parent_sessions: bool) -> FlowResult<F::Output> {
        let child_tracker = flow.progress_tracker();
        if let (Some(parent), Some(child)) = (self.current_tracker(), &child_tracker) {
            parent.set_child_for_current(child);
        }
        let namespace = if share_parent_sessions {
            self.frames.last().map(|f| f.namespace).unwrap_or(0)
        } else {
            let ns = self.next_namespace;
            self.next_namespace += 1;
            ns
        };
        self.frames.push(Frame {
            name: flow.name(),
            initiating: flow.initiating(),
            version: flow.version(),
            namespace,
            tracker: child_tracker.clone().or_else(|| self.current_tracker()),
        });
        debug!(run_id = %self.run_id(), flow = flow.name(), "Entering sub-flow");
        let result = flow.call(self).await;
        self.frames.pop();
        if let Some(tracker) = child_tracker {
            tracker.done();
        }
        result
    }

    /// Top-level frame.
    pub(crate) async fn run_frame<F: FlowLogic + ?Sized>(&mut self, flow: &F) -> FlowResult<F::Output> {
        let tracker = flow.progress_tracker();
        self.frames.push(Frame {
            name: flow.name(),
            initiating: flow.initiating(),
            version: flow.version(),
            namespace: 0,
            tracker: tracker.clone(),
        });
        let result = flow.call(self).await;
        self.frames.pop();
        if let (Ok(_), Some(tracker)) = (&result, tracker) {
            tracker.done();
        }
        result
    }

    fn current_tracker(&self) -> Option<ProgressTracker> {
        self.frames.last().and_then(|f| f.tracker.clone())
    }

    fn current_namespace(&self) -> u32 {
        self.frames.last().map(|f| f.namespace).unwrap_or(0)
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    /// Open a new session to `party`. Nothing is sent until first use.
    pub fn initiate_flow(&mut self, party: &Party) -> FlowResult<FlowSession> {
        let (initiating_flow, version) = self
            .frames
            .iter()
            .rev()
            .find(|f| f.initiating)
            .map(|f| (f.name, f.version))
            .ok_or_else(|| FlowError::NotInitiating {
                flow: self.frames.last().map(|f| f.name).unwrap_or("<none>").to_string(),
            })?;
        let local = SessionId::for_run(&self.run_id(), self.session_counter);
        self.session_counter += 1;
        let record = SessionRecord::initiated(
            local,
            party.clone(),
            initiating_flow,
            version,
            self.current_namespace(),
        );
        self.sessions.insert(local, record);
        debug!(run_id = %self.run_id(), session = %local, party = %party, "Session created");
        Ok(FlowSession {
            local,
            counterparty: party.clone(),
        })
    }

    /// The open session to `party` in the current namespace, created on
    /// first use.
    pub fn session_for(&mut self, party: &Party) -> FlowResult<FlowSession> {
        let namespace = self.current_namespace();
        let existing = self.sessions.values().find(|r| {
            r.initiator && r.namespace == namespace && &r.counterparty == party && !r.closed && !r.ended_by_peer
        });
        match existing {
            Some(record) => Ok(FlowSession {
                local: record.local,
                counterparty: record.counterparty.clone(),
            }),
            None => self.initiate_flow(party),
        }
    }

    fn record_mut(&mut self, session: &SessionId) -> FlowResult<&mut SessionRecord> {
        self.sessions
            .get_mut(session)
            .ok_or_else(|| FlowError::SessionNotAccessible(session.to_string()))
    }

    /// `Init` body if this session still has to be opened.
    fn take_init(&mut self, session: &SessionId) -> FlowResult<Option<MessageBody>> {
        let app_name = self.hub.config.app_name.clone();
        let record = self.record_mut(session)?;
        if !record.initiator || record.init_sent {
            return Ok(None);
        }
        record.init_sent = true;
        Ok(Some(MessageBody::Init {
            initiating_flow: record.initiating_flow.clone(),
            initiator_session: record.local,
            flow_info: FlowInfo {
                flow_version: record.flow_version,
                app_name,
            },
        }))
    }

    /// Assign the next sequence number and, when live, transmit.
    async fn transmit(&mut self, session: &SessionId, body: MessageBody, live: bool) -> FlowResult<()> {
        let sender = self.hub.my_identity.clone();
        let record = self.record_mut(session)?;
        let seq = record.next_send_seq;
        record.next_send_seq += 1;
        if matches!(body, MessageBody::End) {
            record.closed = true;
        }
        let to = record.counterparty.clone();
        let message = SessionMessage {
            recipient: record.remote,
            sender,
            seq,
            body,
        };
        if live {
            debug!(session = %session, to = %to, seq, kind = message.body.kind(), "Sending");
            self.hub.messaging.send(&to, message).await?;
        }
        Ok(())
    }

    fn after_receive(&mut self, session: &SessionId, body: &MessageBody) -> FlowResult<()> {
        let record = self.record_mut(session)?;
        record.next_recv_seq += 1;
        if matches!(body, MessageBody::End | MessageBody::Error { .. }) {
            record.ended_by_peer = true;
        }
        Ok(())
    }

    // =========================================================================
    // JOURNAL
    // =========================================================================

    fn replay_next(&mut self, kind: &SuspensionKind) -> FlowResult<Option<IoOutcome>> {
        let Some(entry) = self.checkpoint.journal.get(self.cursor) else {
            return Ok(None);
        };
        if &entry.kind != kind {
            return Err(FlowError::NonDeterministicReplay {
                expected: entry.kind.to_string(),
                actual: kind.to_string(),
            });
        }
        self.cursor += 1;
        Ok(Some(entry.outcome.clone()))
    }

    fn persist(&mut self) -> FlowResult<()> {
        self.checkpoint.sessions = self.sessions.values().cloned().collect();
        self.hub.checkpoints.put(&self.checkpoint)
    }

    /// Mark the flow blocked in `kind` and persist before waiting.
    fn persist_pending(&mut self, kind: &SuspensionKind) -> FlowResult<()> {
        self.checkpoint.pending = Some(kind.clone());
        self.checkpoint.status = FlowStatus::Suspended;
        self.persist()
    }

    fn record(&mut self, kind: SuspensionKind, outcome: IoOutcome) -> FlowResult<()> {
        self.checkpoint.journal.push(JournalEntry { kind, outcome });
        self.cursor = self.checkpoint.journal.len();
        self.checkpoint.pending = None;
        self.checkpoint.status = FlowStatus::Runnable;
        self.persist()
    }

    /// Await `fut` unless the flow is killed first.
    async fn killable<T>(&self, fut: impl Future<Output = FlowResult<T>>) -> FlowResult<T> {
        self.check_not_killed()?;
        let mut kill = self.kill.clone();
        let killed = async move {
            if kill.wait_for(|k| *k).await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            biased;
            _ = killed => Err(self.killed()),
            result = fut => result,
        }
    }

    // =========================================================================
    // MESSAGING SUSPENSION POINTS
    // =========================================================================

    async fn send_body(&mut self, session: &SessionId, body: MessageBody) -> FlowResult<()> {
        {
            let record = self.record_mut(session)?;
            if record.closed {
                return Err(FlowError::illegal(format!("session {session} is already closed")));
            }
        }
        let kind = SuspensionKind::Send { session: *session };
        let live = self.replay_next(&kind)?.is_none();
        if live {
            self.check_not_killed()?;
        }
        if let Some(init) = self.take_init(session)? {
            self.transmit(session, init, live).await?;
        }
        self.transmit(session, body, live).await?;
        if live {
            self.record(kind, IoOutcome::Sent)?;
        }
        Ok(())
    }

    /// Send `payload` on `session`.
    pub async fn send<T: Serialize>(&mut self, session: &FlowSession, payload: &T) -> FlowResult<()> {
        let payload = Payload::encode(payload)?;
        self.send_body(&session.local, MessageBody::Data(payload)).await
    }

    pub async fn send_all<T: Serialize>(&mut self, sessions: &[FlowSession], payload: &T) -> FlowResult<()> {
        for session in sessions {
            self.send(session, payload).await?;
        }
        Ok(())
    }

    /// Receive the next body on `session`. `None` means the timeout elapsed.
    async fn receive_body(
        &mut self,
        session: &SessionId,
        timeout: Option<Duration>,
    ) -> FlowResult<Option<MessageBody>> {
        let kind = match timeout {
            None => SuspensionKind::Receive { session: *session },
            Some(t) => SuspensionKind::ReceiveWithTimeout {
                session: *session,
                timeout_ms: t.as_millis() as u64,
            },
        };
        let replayed = self.replay_next(&kind)?;
        let live = replayed.is_none();
        if let Some(init) = self.take_init(session)? {
            self.transmit(session, init, live).await?;
        }

        if let Some(outcome) = replayed {
            return match outcome {
                IoOutcome::Received(body) => {
                    self.after_receive(session, &body)?;
                    Ok(Some(body))
                }
                IoOutcome::TimedOut => Ok(None),
                other => Err(FlowError::NonDeterministicReplay {
                    expected: format!("{other:?}"),
                    actual: kind.to_string(),
                }),
            };
        }

        let seq = self.record_mut(session)?.next_recv_seq;
        self.persist_pending(&kind)?;
        let messaging = self.hub.messaging.clone();
        let local = *session;
        let received = match timeout {
            None => {
                let fut = async move { messaging.receive(local, seq).await };
                Some(self.killable(fut).await?)
            }
            Some(limit) => {
                let fut = async move {
                    match tokio::time::timeout(limit, messaging.receive(local, seq)).await {
                        Ok(result) => result.map(Some),
                        Err(_) => Ok(None),
                    }
                };
                self.killable(fut).await?
            }
        };

        match received {
            Some(message) => {
                let body = message.body;
                debug!(session = %session, seq, kind = body.kind(), "Received");
                self.after_receive(session, &body)?;
                self.record(kind, IoOutcome::Received(body.clone()))?;
                self.hub.messaging.acknowledge(*session, seq);
                Ok(Some(body))
            }
            None => {
                self.record(kind, IoOutcome::TimedOut)?;
                Ok(None)
            }
        }
    }

    fn interpret<T: DeserializeOwned>(&self, session: &FlowSession, body: MessageBody) -> FlowResult<UntrustworthyData<T>> {
        match body {
            MessageBody::Data(payload) => Ok(UntrustworthyData::new(payload.decode()?)),
            MessageBody::Error {
                exception: Some(exception),
                ..
            } => Err(FlowError::Remote(exception)),
            MessageBody::Error {
                exception: None,
                error_id,
            } => Err(FlowError::UnexpectedFlowEnd {
                party: session.counterparty.name.clone(),
                error_id: Some(error_id),
            }),
            MessageBody::End => Err(FlowError::UnexpectedFlowEnd {
                party: session.counterparty.name.clone(),
                error_id: None,
            }),
            MessageBody::Init { .. } => Err(FlowError::Messaging(format!(
                "unexpected session init on {}",
                session.local
            ))),
        }
    }

    /// Receive a `T` on `session`. Fails if the counterparty sent another
    /// type, raised an error or ended the session.
    pub async fn receive<T: DeserializeOwned>(&mut self, session: &FlowSession) -> FlowResult<UntrustworthyData<T>> {
        let body = self
            .receive_body(&session.local, None)
            .await?
            .ok_or_else(|| FlowError::Internal("untimed receive timed out".into()))?;
        self.interpret(session, body)
    }

    pub async fn receive_all<T: DeserializeOwned>(
        &mut self,
        sessions: &[FlowSession],
    ) -> FlowResult<Vec<UntrustworthyData<T>>> {
        let mut out = Vec::with_capacity(sessions.len());
        for session in sessions {
            out.push(self.receive(session).await?);
        }
        Ok(out)
    }

    pub async fn send_and_receive<R: DeserializeOwned, T: Serialize>(
        &mut self,
        session: &FlowSession,
        payload: &T,
    ) -> FlowResult<UntrustworthyData<R>> {
        self.send(session, payload).await?;
        self.receive(session).await
    }

    /// Send-and-receive that survives an unresponsive counterparty: after
    /// each timeout the identical payload is re-sent on a fresh session,
    /// with exponential back-off. Only for request/response exchanges the
    /// counterparty handles idempotently.
    pub async fn send_and_receive_with_retry<R: DeserializeOwned, T: Serialize>(
        &mut self,
        party: &Party,
        payload: &T,
    ) -> FlowResult<UntrustworthyData<R>> {
        let timeout = self.hub.config.receive_timeout();
        let max_retries = self.hub.config.max_retries;
        for attempt in 0..=max_retries {
            if attempt > 0 {
                let backoff = self.hub.config.backoff(attempt);
                warn!(run_id = %self.run_id(), party = %party, attempt, "No response, retrying");
                self.sleep(backoff).await?;
            }
            let session = self.initiate_flow(party)?;
            self.send(&session, payload).await?;
            if let Some(body) = self.receive_body(&session.local, Some(timeout)).await? {
                return self.interpret(&session, body);
            }
            // Abandoned; a late reply is never read and no error is sent.
            self.record_mut(&session.local)?.closed = true;
        }
        Err(FlowError::RetriesExhausted {
            party: party.name.clone(),
            attempts: max_retries + 1,
        })
    }

    /// Tell the counterparties we will not send again. Later failures of
    /// this flow are then not propagated to them.
    pub async fn close_sessions(&mut self, sessions: &[FlowSession]) -> FlowResult<()> {
        for session in sessions {
            let open = self
                .sessions
                .get(&session.local)
                .map(|r| r.init_sent && !r.closed)
                .unwrap_or(false);
            if open {
                self.send_body(&session.local, MessageBody::End).await?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // OTHER SUSPENSION POINTS
    // =========================================================================

    pub async fn sleep(&mut self, duration: Duration) -> FlowResult<()> {
        let kind = SuspensionKind::Sleep {
            millis: duration.as_millis() as u64,
        };
        if self.replay_next(&kind)?.is_some() {
            return Ok(());
        }
        self.persist_pending(&kind)?;
        self.killable(async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await?;
        self.record(kind, IoOutcome::Slept)
    }

    /// Suspend until `tx_id` is recorded in the local store.
    pub async fn wait_for_ledger_commit(&mut self, tx_id: &SecureHash) -> FlowResult<SignedTransaction> {
        let kind = SuspensionKind::WaitForLedgerCommit { tx_id: *tx_id };
        match self.replay_next(&kind)? {
            Some(IoOutcome::Committed(stx)) => return Ok(*stx),
            Some(other) => {
                return Err(FlowError::NonDeterministicReplay {
                    expected: format!("{other:?}"),
                    actual: kind.to_string(),
                })
            }
            None => {}
        }
        self.persist_pending(&kind)?;
        let transactions = self.hub.transactions.clone();
        let id = *tx_id;
        let stx = self
            .killable(async move { Ok(transactions.wait_for_transaction(&id).await) })
            .await?;
        self.record(kind, IoOutcome::Committed(Box::new(stx.clone())))?;
        Ok(stx)
    }

    /// Run `operation` outside the flow and suspend until it completes.
    ///
    /// The deduplication id handed to the operation is derived from the run
    /// id and the journal position, so a resumed run passes the same id.
    pub async fn execute_async<O: FlowExternalOperation>(&mut self, operation: O) -> FlowResult<O::Output> {
        let token = format!("{}-{}", self.run_id(), self.cursor);
        let kind = SuspensionKind::ExecuteAsync { token: token.clone() };
        let outcome = match self.replay_next(&kind)? {
            Some(IoOutcome::AsyncResult(result)) => result,
            Some(other) => {
                return Err(FlowError::NonDeterministicReplay {
                    expected: format!("{other:?}"),
                    actual: kind.to_string(),
                })
            }
            None => {
                self.persist_pending(&kind)?;
                let handle = tokio::spawn(async move {
                    let output = operation.execute(token).await?;
                    Ok::<_, FlowError>(encoding::encode(&output)?)
                });
                let result = self
                    .killable(async move {
                        match handle.await {
                            Ok(result) => Ok(result),
                            Err(e) => Err(FlowError::Internal(format!("async operation panicked: {e}"))),
                        }
                    })
                    .await?;
                self.record(kind, IoOutcome::AsyncResult(result.clone()))?;
                result
            }
        };
        Ok(encoding::decode(&outcome?)?)
    }

    // =========================================================================
    // COMPLETION
    // =========================================================================

    /// Notify every session still expecting to hear from us how the run
    /// ended. Every counterparty of one failure sees the same error id,
    /// which is returned so the caller can log it.
    pub(crate) async fn finish(&mut self, result: &FlowResult<Vec<u8>>) -> Option<ErrorId> {
        let (body, error_id) = match result {
            Ok(_) => (MessageBody::End, None),
            Err(error) => {
                let (exception, error_id) = error.to_session_error();
                (MessageBody::Error { exception, error_id }, Some(error_id))
            }
        };
        let open: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|r| r.is_open())
            .map(|r| r.local)
            .collect();
        for session in open {
            if let Err(e) = self.transmit(&session, body.clone(), true).await {
                warn!(run_id = %self.run_id(), session = %session, error = %e, "Failed to notify counterparty");
            }
        }
        error_id
    }
}
