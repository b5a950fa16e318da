//! # Batching Uniqueness Provider
//!
//! In-memory commit log with a single writer. Callers enqueue requests on a
//! bounded channel and wait for their own reply; the writer drains up to
//! `batch_size` requests (waiting at most `batch_timeout` after the first)
//! and processes them in arrival order under one write lock.
//!
//! ```text
//! commit() ──▶ [bounded queue] ──▶ writer ──▶ CommitLog ──▶ oneshot reply
//!   commit() ─┘                      │
//!                                    └── batch: r1, r2, r3 (r3 sees r1's states)
//! ```
//!
//! Processing one request:
//!
//! | Condition | Result |
//! |-----------|--------|
//! | Transaction already committed | success |
//! | Any input or reference consumed | `Conflict` naming all of them |
//! | Outside the time window | `TimeWindowInvalid` |
//! | Otherwise | inputs consumed, success |

use crate::config::NotaryConfig;
use crate::domain::validate_time_window;
use crate::error::{ConsumedStateType, NotaryError, NotaryResult, StateConsumptionDetails};
use crate::metrics;
use crate::ports::{CommitRequest, RequestLogEntry, UniquenessProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lf_01_task_engine::ports::Clock;
use parking_lot::{Mutex, RwLock};
use shared_types::{SecureHash, StateRef};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

struct PendingCommit {
    request: CommitRequest,
    reply: oneshot::Sender<NotaryResult<()>>,
}

#[derive(Default)]
struct CommitLog {
    consumed: HashMap<StateRef, SecureHash>,
    committed_transactions: HashSet<SecureHash>,
    requests: Vec<RequestLogEntry>,
}

impl CommitLog {
    fn process(&mut self, request: &CommitRequest, now: DateTime<Utc>, tolerance: Duration) -> NotaryResult<()> {
        if self.committed_transactions.contains(&request.tx_id) {
            debug!(tx_id = %request.tx_id, "Transaction already committed");
            return Ok(());
        }

        let inputs = request.states.iter().map(|s| (s, ConsumedStateType::InputState));
        let references = request
            .references
            .iter()
            .map(|s| (s, ConsumedStateType::ReferenceInputState));
        let conflicts: BTreeMap<StateRef, StateConsumptionDetails> = inputs
            .chain(references)
            .filter_map(|(state, kind)| {
                self.consumed
                    .get(state)
                    .map(|by| (*state, StateConsumptionDetails::consumed_by(by, kind)))
            })
            .collect();
        if !conflicts.is_empty() {
            return Err(NotaryError::Conflict {
                tx_id: request.tx_id,
                consumed_states: conflicts,
            });
        }

        if let Some(error) = validate_time_window(now, request.time_window.as_ref(), tolerance) {
            return Err(error);
        }

        for state in &request.states {
            self.consumed.insert(*state, request.tx_id);
        }
        self.committed_transactions.insert(request.tx_id);
        Ok(())
    }
}

/// Single-writer, batching [`UniquenessProvider`] over an in-memory log.
pub struct BatchingUniquenessProvider {
    queue: mpsc::Sender<PendingCommit>,
    log: Arc<RwLock<CommitLog>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl BatchingUniquenessProvider {
    /// Start the writer task. Must be called within a Tokio runtime.
    pub fn new(config: &NotaryConfig, clock: Arc<dyn Clock>) -> Arc<Self> {
        let (queue, requests) = mpsc::channel(config.request_queue_size.max(1));
        let log = Arc::new(RwLock::new(CommitLog::default()));
        let writer = tokio::spawn(run_writer(requests, log.clone(), clock, config.clone()));
        info!(
            batch_size = config.batch_size,
            batch_timeout_ms = config.batch_timeout_ms,
            "Uniqueness provider started"
        );
        Arc::new(Self {
            queue,
            log,
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Stop the writer. Pending and later commits fail.
    pub fn stop(&self) {
        if let Some(writer) = self.writer.lock().take() {
            writer.abort();
        }
    }

    pub fn committed_transaction_count(&self) -> usize {
        self.log.read().committed_transactions.len()
    }
}

impl Drop for BatchingUniquenessProvider {
    fn drop(&mut self) {
        self.stop();
    }
}

fn stopped() -> NotaryError {
    NotaryError::General {
        cause: "uniqueness provider is not running".to_string(),
    }
}

#[async_trait]
impl UniquenessProvider for BatchingUniquenessProvider {
    async fn commit(&self, request: CommitRequest) -> NotaryResult<()> {
        let (reply, response) = oneshot::channel();
        self.queue
            .send(PendingCommit { request, reply })
            .await
            .map_err(|_| stopped())?;
        response.await.map_err(|_| stopped())?
    }

    fn consumed_by(&self, state: &StateRef) -> Option<SecureHash> {
        self.log.read().consumed.get(state).copied()
    }

    fn request_log(&self) -> Vec<RequestLogEntry> {
        self.log.read().requests.clone()
    }
}

async fn run_writer(
    mut requests: mpsc::Receiver<PendingCommit>,
    log: Arc<RwLock<CommitLog>>,
    clock: Arc<dyn Clock>,
    config: NotaryConfig,
) {
    let batch_size = config.batch_size.max(1);
    let mut batch = Vec::with_capacity(batch_size);
    while let Some(first) = requests.recv().await {
        batch.push(first);
        let deadline = tokio::time::Instant::now() + config.batch_timeout();
        while batch.len() < batch_size {
            match tokio::time::timeout_at(deadline, requests.recv()).await {
                Ok(Some(next)) => batch.push(next),
                Ok(None) | Err(_) => break,
            }
        }
        process_batch(&log, clock.now(), config.time_tolerance(), &mut batch);
    }
    debug!("Uniqueness provider writer stopped");
}

fn process_batch(
    log: &RwLock<CommitLog>,
    now: DateTime<Utc>,
    tolerance: Duration,
    batch: &mut Vec<PendingCommit>,
) {
    let size = batch.len();
    let mut accepted = 0;
    let mut log = log.write();
    for pending in batch.drain(..) {
        let result = log.process(&pending.request, now, tolerance);
        if result.is_ok() {
            accepted += 1;
        }
        log.requests.push(RequestLogEntry {
            tx_id: pending.request.tx_id,
            requester: pending.request.caller.name.clone(),
            requested_at: now,
            accepted: result.is_ok(),
        });
        // The caller may have given up; the commit stands regardless.
        let _ = pending.reply.send(result);
    }
    drop(log);
    metrics::record_commit_batch(size);
    debug!(size, accepted, "Processed commit batch");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NotarisationRequestSignature;
    use chrono::TimeZone;
    use lf_01_task_engine::adapters::TestClock;
    use shared_types::{DigitalSignatureWithKey, Party, PublicKey, TimeWindow};

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn provider() -> (Arc<BatchingUniquenessProvider>, Arc<TestClock>) {
        let clock = Arc::new(TestClock::new(start()));
        let config = NotaryConfig {
            time_tolerance_ms: 0,
            ..NotaryConfig::default()
        };
        (BatchingUniquenessProvider::new(&config, clock.clone()), clock)
    }

    fn tx(name: &str) -> SecureHash {
        SecureHash::sha256(name.as_bytes())
    }

    fn state(name: &str) -> StateRef {
        StateRef::new(SecureHash::sha256(name.as_bytes()), 0)
    }

    fn request(tx_id: SecureHash, states: Vec<StateRef>) -> CommitRequest {
        CommitRequest {
            states,
            tx_id,
            caller: Party::new("Alice", PublicKey([1; 32])),
            request_signature: NotarisationRequestSignature {
                digital_signature: DigitalSignatureWithKey {
                    by: PublicKey([1; 32]),
                    bytes: vec![],
                },
                platform_version: 4,
            },
            time_window: None,
            references: vec![],
        }
    }

    // ===== INPUT STATES =====

    #[tokio::test]
    async fn test_commits_unused_inputs() {
        let (provider, _) = provider();
        provider.commit(request(tx("t1"), vec![state("a")])).await.unwrap();
        assert_eq!(provider.consumed_by(&state("a")), Some(tx("t1")));
        provider.commit(request(tx("t2"), vec![state("b")])).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_previously_used_inputs() {
        let (provider, _) = provider();
        provider.commit(request(tx("t1"), vec![state("a")])).await.unwrap();

        let err = provider
            .commit(request(tx("t2"), vec![state("a"), state("b")]))
            .await
            .unwrap_err();
        match err {
            NotaryError::Conflict { tx_id, consumed_states } => {
                assert_eq!(tx_id, tx("t2"));
                assert_eq!(consumed_states.len(), 1);
                let details = consumed_states[&state("a")];
                assert_eq!(details.hash_of_transaction_id, tx("t1").rehash());
                assert_eq!(details.kind, ConsumedStateType::InputState);
            }
            other => panic!("unexpected {other:?}"),
        }
        // Nothing of the refused request was consumed.
        assert_eq!(provider.consumed_by(&state("b")), None);
    }

    #[tokio::test]
    async fn test_recommit_of_same_transaction_succeeds() {
        let (provider, _) = provider();
        provider.commit(request(tx("t1"), vec![state("a")])).await.unwrap();
        provider.commit(request(tx("t1"), vec![state("a")])).await.unwrap();
        assert_eq!(provider.committed_transaction_count(), 1);
    }

    // ===== REFERENCE STATES =====

    #[tokio::test]
    async fn test_unused_references_are_not_consumed() {
        let (provider, _) = provider();
        let mut r1 = request(tx("t1"), vec![state("a")]);
        r1.references = vec![state("ref")];
        provider.commit(r1).await.unwrap();
        assert_eq!(provider.consumed_by(&state("ref")), None);

        let mut r2 = request(tx("t2"), vec![state("b")]);
        r2.references = vec![state("ref")];
        provider.commit(r2).await.unwrap();
    }

    #[tokio::test]
    async fn test_consumed_reference_is_a_conflict() {
        let (provider, _) = provider();
        provider.commit(request(tx("t1"), vec![state("ref")])).await.unwrap();

        let mut r2 = request(tx("t2"), vec![]);
        r2.references = vec![state("ref")];
        match provider.commit(r2).await.unwrap_err() {
            NotaryError::Conflict { consumed_states, .. } => {
                assert_eq!(consumed_states[&state("ref")].kind, ConsumedStateType::ReferenceInputState);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_reference_is_spent() {
        let (provider, _) = provider();
        let mut r1 = request(tx("t1"), vec![]);
        r1.references = vec![state("ref")];
        provider.commit(r1.clone()).await.unwrap();
        provider.commit(request(tx("t2"), vec![state("ref")])).await.unwrap();
        provider.commit(r1).await.unwrap();
    }

    // ===== TIME WINDOWS =====

    #[tokio::test]
    async fn test_rejects_outside_time_window() {
        let (provider, _) = provider();
        let window = TimeWindow::until_only(start() - chrono::Duration::minutes(30));
        let mut r = request(tx("t1"), vec![state("a")]);
        r.time_window = Some(window);
        match provider.commit(r).await.unwrap_err() {
            NotaryError::TimeWindowInvalid { tx_time_window, .. } => assert_eq!(tx_time_window, window),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(provider.consumed_by(&state("a")), None);
    }

    #[tokio::test]
    async fn test_time_window_only_retry_succeeds_after_expiry() {
        let (provider, clock) = provider();
        let mut r = request(tx("t1"), vec![]);
        r.time_window = Some(TimeWindow::until_only(start() + chrono::Duration::minutes(30)));
        provider.commit(r.clone()).await.unwrap();

        clock.advance(chrono::Duration::hours(1));
        provider.commit(r).await.unwrap();
    }

    #[tokio::test]
    async fn test_conflict_wins_over_time_window() {
        let (provider, _) = provider();
        provider.commit(request(tx("t1"), vec![state("ref")])).await.unwrap();
        let mut r = request(tx("t2"), vec![]);
        r.references = vec![state("ref")];
        r.time_window = Some(TimeWindow::until_only(start() - chrono::Duration::minutes(30)));
        assert!(matches!(provider.commit(r).await, Err(NotaryError::Conflict { .. })));
    }

    // ===== CONCURRENCY =====

    #[tokio::test]
    async fn test_concurrent_spends_have_one_winner() {
        let (provider, _) = provider();
        let mut tasks = Vec::new();
        for i in 0..16 {
            let provider = provider.clone();
            tasks.push(tokio::spawn(async move {
                let id = tx(&format!("spender-{i}"));
                (id, provider.commit(request(id, vec![state("contested")])).await)
            }));
        }
        let mut winners = Vec::new();
        for task in tasks {
            let (id, result) = task.await.unwrap();
            match result {
                Ok(()) => winners.push(id),
                Err(NotaryError::Conflict { consumed_states, .. }) => {
                    assert!(consumed_states.contains_key(&state("contested")));
                }
                Err(other) => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(winners.len(), 1);
        assert_eq!(provider.consumed_by(&state("contested")), Some(winners[0]));
        assert_eq!(provider.request_log().len(), 16);
    }

    #[tokio::test]
    async fn test_stopped_provider_reports_general_error() {
        let (provider, _) = provider();
        provider.stop();
        tokio::task::yield_now().await;
        let result = provider.commit(request(tx("t1"), vec![state("a")])).await;
        assert!(matches!(result, Err(NotaryError::General { .. })));
    }
}
