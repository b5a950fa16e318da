//! # Flow Manager
//!
//! Starts, kills and restores flow runs on one node, and starts responders
//! for sessions opened by counterparties.
//!
//! ```text
//!  start_flow ──▶ checkpoint put ──▶ spawn(drive) ──▶ FlowHandle
//!  Init msg   ──▶ registry lookup ──▶ checkpoint put ──▶ ack ──▶ spawn(drive)
//!  restore    ──▶ checkpoint all  ──▶ rebuild flow    ──▶ spawn(drive, replay)
//! ```
//!
//! Flows started with [`FlowManager::start_flow`] can only be restored after
//! a restart if their type is registered with [`FlowRegistry::register_flow`].

use crate::domain::{Checkpoint, FlowSession, FlowStart, MessageBody, RunId, SessionMessage};
use crate::error::{FlowError, FlowException, FlowResult};
use crate::ports::{DynFlow, FlowLogic};
use crate::runtime;
use crate::services::ServiceHub;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::encoding;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type FlowFactory = Arc<dyn Fn(&[u8]) -> FlowResult<Arc<dyn DynFlow>> + Send + Sync>;
type ResponderFactory = Arc<dyn Fn(FlowSession) -> Arc<dyn DynFlow> + Send + Sync>;
type ResultSlot = Option<FlowResult<Vec<u8>>>;

/// Flow constructors by name. Shared across restarts of a node.
#[derive(Default)]
pub struct FlowRegistry {
    flows: RwLock<HashMap<String, FlowFactory>>,
    responders: RwLock<HashMap<String, ResponderFactory>>,
}

impl FlowRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make flows of type `F` restorable from their encoded arguments.
    pub fn register_flow<F>(&self, name: &str)
    where
        F: FlowLogic + DeserializeOwned + 'static,
        F::Output: Serialize,
    {
        let factory: FlowFactory = Arc::new(|args: &[u8]| {
            let flow: F = encoding::decode(args)?;
            Ok(Arc::new(flow) as Arc<dyn DynFlow>)
        });
        self.flows.write().insert(name.to_string(), factory);
    }

    /// Start a `F` whenever a counterparty opens a session from
    /// `initiating_flow`.
    pub fn register_responder<F, Fac>(&self, initiating_flow: &str, factory: Fac)
    where
        F: FlowLogic + 'static,
        F::Output: Serialize,
        Fac: Fn(FlowSession) -> F + Send + Sync + 'static,
    {
        let factory: ResponderFactory = Arc::new(move |session| Arc::new(factory(session)) as Arc<dyn DynFlow>);
        self.responders.write().insert(initiating_flow.to_string(), factory);
    }

    fn flow(&self, name: &str) -> Option<FlowFactory> {
        self.flows.read().get(name).cloned()
    }

    fn responder(&self, initiating_flow: &str) -> Option<ResponderFactory> {
        self.responders.read().get(initiating_flow).cloned()
    }
}

/// Awaitable result of a flow run.
pub struct FlowHandle<T> {
    pub run_id: RunId,
    result: watch::Receiver<ResultSlot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> FlowHandle<T> {
    pub async fn result(mut self) -> FlowResult<T> {
        let slot = self
            .result
            .wait_for(|r| r.is_some())
            .await
            .map(|r| r.clone())
            .map_err(|_| FlowError::Internal(format!("flow {} stopped before completing", self.run_id)))?;
        match slot {
            Some(Ok(bytes)) => Ok(encoding::decode(&bytes)?),
            Some(Err(e)) => Err(e),
            None => Err(FlowError::Internal(format!("flow {} has no result", self.run_id))),
        }
    }
}

struct RunningFlow {
    flow_name: String,
    kill: watch::Sender<bool>,
    result: watch::Receiver<ResultSlot>,
    task: JoinHandle<()>,
}

struct ManagerInner {
    hub: Arc<ServiceHub>,
    registry: Arc<FlowRegistry>,
    flows: RwLock<HashMap<RunId, RunningFlow>>,
}

impl ManagerInner {
    fn spawn_run(self: &Arc<Self>, flow: Arc<dyn DynFlow>, checkpoint: Checkpoint) {
        let run_id = checkpoint.run_id;
        let flow_name = flow.name().to_string();
        let (kill_tx, kill_rx) = watch::channel(false);
        let (result_tx, result_rx) = watch::channel(None);
        let hub = self.hub.clone();
        let task = tokio::spawn(async move {
            let result = runtime::drive(hub, flow, checkpoint, kill_rx).await;
            let _ = result_tx.send(Some(result));
        });
        self.flows.write().insert(
            run_id,
            RunningFlow {
                flow_name,
                kill: kill_tx,
                result: result_rx,
                task,
            },
        );
    }

    async fn accept_session(self: &Arc<Self>, init: SessionMessage) {
        let MessageBody::Init {
            initiating_flow,
            initiator_session,
            flow_info,
        } = init.body.clone()
        else {
            warn!(session = %init.recipient, "Non-init message on session dispatch");
            return;
        };
        let local = init.recipient;

        let already_running = self
            .hub
            .checkpoints
            .all()
            .map(|all| all.iter().any(|c| c.initiated_by() == Some(local)))
            .unwrap_or(false);
        if already_running {
            self.hub.messaging.acknowledge(local, 0);
            return;
        }

        let Some(factory) = self.registry.responder(&initiating_flow) else {
            warn!(party = %init.sender, flow = %initiating_flow, "No responder registered, rejecting session");
            let exception = FlowException::new(format!(
                "{} has no responder for {initiating_flow}",
                self.hub.my_identity
            ));
            let reject = SessionMessage {
                recipient: initiator_session,
                sender: self.hub.my_identity.clone(),
                seq: 0,
                body: MessageBody::Error {
                    error_id: exception.error_id,
                    exception: Some(exception),
                },
            };
            self.hub.messaging.acknowledge(local, 0);
            if let Err(e) = self.hub.messaging.send(&init.sender, reject).await {
                warn!(error = %e, "Failed to reject session");
            }
            return;
        };

        let session = FlowSession {
            local,
            counterparty: init.sender.clone(),
        };
        let flow = factory(session);
        let run_id = RunId::random();
        let checkpoint = Checkpoint::new(
            run_id,
            flow.name(),
            self.hub.my_identity.clone(),
            FlowStart::Initiated {
                initiating_flow: initiating_flow.clone(),
                local,
                initiator_session,
                counterparty: init.sender.clone(),
                flow_info,
            },
        );
        if let Err(e) = self.hub.checkpoints.put(&checkpoint) {
            warn!(error = %e, "Failed to persist responder checkpoint");
            return;
        }
        self.hub.messaging.acknowledge(local, 0);
        debug!(run_id = %run_id, flow = flow.name(), party = %init.sender, "Responder started");
        self.spawn_run(flow, checkpoint);
    }
}

/// Runs flows on one node.
pub struct FlowManager {
    inner: Arc<ManagerInner>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl FlowManager {
    pub fn new(hub: Arc<ServiceHub>, registry: Arc<FlowRegistry>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                hub,
                registry,
                flows: RwLock::new(HashMap::new()),
            }),
            dispatcher: Mutex::new(None),
        }
    }

    pub fn hub(&self) -> &Arc<ServiceHub> {
        &self.inner.hub
    }

    pub fn registry(&self) -> &Arc<FlowRegistry> {
        &self.inner.registry
    }

    /// Start accepting sessions opened by counterparties.
    pub fn start(&self) {
        let mut dispatcher = self.dispatcher.lock();
        if dispatcher.is_some() {
            return;
        }
        let inner = self.inner.clone();
        *dispatcher = Some(tokio::spawn(async move {
            loop {
                let init = inner.hub.messaging.next_session_init().await;
                inner.accept_session(init).await;
            }
        }));
        info!(node = %self.inner.hub.my_identity, "Flow manager started");
    }

    /// Start `flow` as a new top-level run.
    pub fn start_flow<F>(&self, flow: F) -> FlowResult<FlowHandle<F::Output>>
    where
        F: FlowLogic + Serialize + 'static,
        F::Output: Serialize + DeserializeOwned,
    {
        let run_id = RunId::random();
        let name = flow.name();
        if self.inner.registry.flow(name).is_none() {
            debug!(flow = name, "Flow type not registered; it cannot be restored after restart");
        }
        let checkpoint = Checkpoint::new(
            run_id,
            name,
            self.inner.hub.my_identity.clone(),
            FlowStart::Explicit {
                flow_name: name.to_string(),
                args: encoding::encode(&flow)?,
            },
        );
        self.inner.hub.checkpoints.put(&checkpoint)?;
        self.inner.spawn_run(Arc::new(flow), checkpoint);
        self.track(run_id)
            .ok_or_else(|| FlowError::Internal(format!("flow {run_id} vanished")))
    }

    /// Handle to the result of a run started or restored by this manager.
    pub fn track<T: DeserializeOwned>(&self, run_id: RunId) -> Option<FlowHandle<T>> {
        self.inner.flows.read().get(&run_id).map(|f| FlowHandle {
            run_id,
            result: f.result.clone(),
            _marker: PhantomData,
        })
    }

    /// Ask a run to stop. It fails with `Killed` at its next suspension
    /// point. Returns `false` if the run is unknown or finished.
    pub fn kill_flow(&self, run_id: &RunId) -> bool {
        let flows = self.inner.flows.read();
        match flows.get(run_id) {
            Some(f) if f.result.borrow().is_none() => {
                info!(run_id = %run_id, flow = %f.flow_name, "Killing flow");
                f.kill.send(true).is_ok()
            }
            _ => false,
        }
    }

    /// Runs that have not completed.
    pub fn running_flows(&self) -> Vec<RunId> {
        self.inner
            .flows
            .read()
            .iter()
            .filter(|(_, f)| f.result.borrow().is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Resume every checkpointed run not already running here. Returns the
    /// number resumed.
    pub fn restore_flows(&self) -> FlowResult<usize> {
        let mut restored = 0;
        for checkpoint in self.inner.hub.checkpoints.all()? {
            if self.inner.flows.read().contains_key(&checkpoint.run_id) {
                continue;
            }
            let flow = match &checkpoint.start {
                FlowStart::Explicit { flow_name, args } => match self.inner.registry.flow(flow_name) {
                    Some(factory) => factory(args)?,
                    None => {
                        warn!(run_id = %checkpoint.run_id, flow = %flow_name, "Cannot restore unregistered flow");
                        continue;
                    }
                },
                FlowStart::Initiated {
                    initiating_flow,
                    local,
                    counterparty,
                    ..
                } => match self.inner.registry.responder(initiating_flow) {
                    Some(factory) => factory(FlowSession {
                        local: *local,
                        counterparty: counterparty.clone(),
                    }),
                    None => {
                        warn!(run_id = %checkpoint.run_id, flow = %initiating_flow, "Cannot restore responder");
                        continue;
                    }
                },
            };
            self.inner.spawn_run(flow, checkpoint);
            restored += 1;
        }
        info!(node = %self.inner.hub.my_identity, restored, "Flows restored from checkpoints");
        Ok(restored)
    }

    /// Stop everything abruptly, as a process crash would. Checkpoints are
    /// left in place.
    pub fn shutdown(&self) {
        if let Some(dispatcher) = self.dispatcher.lock().take() {
            dispatcher.abort();
        }
        for flow in self.inner.flows.read().values() {
            flow.task.abort();
        }
    }
}

impl Drop for FlowManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
