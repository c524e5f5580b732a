/*!
 * Lifecycle Service
 *
 * Owns the pipeline engine on one tokio task. All engine mutation happens
 * on that task; callers talk to it through commands. The loop also fires
 * stage deadlines and periodically reaps exited native processes.
 */

use crate::core::errors::ServiceError;
use crate::core::id::{CorrelationToken, TaskUid};
use crate::core::limits::MIN_REAP_INTERVAL;
use crate::core::types::{AppId, Pid};
use crate::gate::{GateResult, PrerequisiteGate};
use crate::memory::ReclaimOutcome;
use crate::pipeline::{StageChain, StagePipelineEngine, StandardChains};
use crate::task::{ReplyObligation, TaskReply, TaskRequest, TaskSnapshot};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Control messages for the service task
#[derive(Debug)]
pub enum ServiceCommand {
    Submit {
        request: TaskRequest,
        reply: ReplyObligation,
        /// Overrides the standard chain for the request type
        chain: Option<Arc<StageChain>>,
    },
    ExternalReply {
        token: CorrelationToken,
        payload: Value,
    },
    ReclaimComplete {
        uid: TaskUid,
        outcome: ReclaimOutcome,
    },
    AppRegistered(AppId),
    ProcessExited(Pid),
    SetReady(bool),
    Cancel {
        uid: TaskUid,
        done: oneshot::Sender<bool>,
    },
    CancelAll {
        done: oneshot::Sender<usize>,
    },
    Snapshot {
        done: oneshot::Sender<Vec<TaskSnapshot>>,
    },
    /// Cancel everything and stop the loop
    Shutdown {
        done: oneshot::Sender<usize>,
    },
}

/// Handle to the service task
pub struct LifecycleService {
    command_tx: mpsc::UnboundedSender<ServiceCommand>,
    handle: Option<tokio::task::JoinHandle<StagePipelineEngine>>,
}

impl LifecycleService {
    /// Spawn the service loop; must be called inside a tokio runtime
    pub fn spawn(engine: StagePipelineEngine, chains: StandardChains) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let configured = engine.context().config.reap_interval;
        let reap_interval = configured.max(MIN_REAP_INTERVAL);
        if reap_interval != configured {
            warn!(
                configured_ms = configured.as_millis() as u64,
                "reap interval below minimum, clamped"
            );
        }

        let handle = tokio::spawn(run_service_loop(engine, chains, command_rx, reap_interval));
        info!(reap_interval_ms = reap_interval.as_millis() as u64, "lifecycle service spawned");

        Self {
            command_tx,
            handle: Some(handle),
        }
    }

    fn send(&self, cmd: ServiceCommand) -> Result<(), ServiceError> {
        self.command_tx.send(cmd).map_err(|_| ServiceError::Stopped)
    }

    /// Submit a request on its standard chain; resolves with the task reply
    pub fn submit(
        &self,
        request: impl Into<TaskRequest>,
    ) -> Result<oneshot::Receiver<TaskReply>, ServiceError> {
        let (reply, rx) = ReplyObligation::channel();
        self.send(ServiceCommand::Submit {
            request: request.into(),
            reply,
            chain: None,
        })?;
        Ok(rx)
    }

    /// Submit a request on a caller-supplied chain
    pub fn submit_with_chain(
        &self,
        request: impl Into<TaskRequest>,
        chain: Arc<StageChain>,
    ) -> Result<oneshot::Receiver<TaskReply>, ServiceError> {
        let (reply, rx) = ReplyObligation::channel();
        self.send(ServiceCommand::Submit {
            request: request.into(),
            reply,
            chain: Some(chain),
        })?;
        Ok(rx)
    }

    pub fn external_reply(&self, token: CorrelationToken, payload: Value) -> Result<(), ServiceError> {
        self.send(ServiceCommand::ExternalReply { token, payload })
    }

    pub fn reclaim_complete(&self, uid: TaskUid, outcome: ReclaimOutcome) -> Result<(), ServiceError> {
        self.send(ServiceCommand::ReclaimComplete { uid, outcome })
    }

    pub fn app_registered(&self, app_id: impl Into<AppId>) -> Result<(), ServiceError> {
        self.send(ServiceCommand::AppRegistered(app_id.into()))
    }

    pub fn process_exited(&self, pid: Pid) -> Result<(), ServiceError> {
        self.send(ServiceCommand::ProcessExited(pid))
    }

    pub fn set_ready(&self, ready: bool) -> Result<(), ServiceError> {
        self.send(ServiceCommand::SetReady(ready))
    }

    pub async fn cancel(&self, uid: TaskUid) -> Result<bool, ServiceError> {
        let (done, rx) = oneshot::channel();
        self.send(ServiceCommand::Cancel { uid, done })?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    pub async fn cancel_all(&self) -> Result<usize, ServiceError> {
        let (done, rx) = oneshot::channel();
        self.send(ServiceCommand::CancelAll { done })?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    pub async fn snapshot(&self) -> Result<Vec<TaskSnapshot>, ServiceError> {
        let (done, rx) = oneshot::channel();
        self.send(ServiceCommand::Snapshot { done })?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    /// Run the prerequisite gate and open the engine if it passes
    ///
    /// A failed gate leaves the engine closed; the caller decides whether
    /// to continue degraded (`set_ready(true)`) or abort.
    pub async fn bootstrap(&self, mut gate: PrerequisiteGate) -> Result<GateResult, ServiceError> {
        let result = gate.wait().await;
        match result {
            GateResult::Passed => {
                info!("prerequisites passed, accepting tasks");
                self.set_ready(true)?;
            }
            GateResult::Failed => warn!("prerequisites failed, engine stays closed"),
        }
        Ok(result)
    }

    /// Cancel every in-flight task and stop the loop
    ///
    /// Returns the stopped engine and the number of tasks cancelled.
    pub async fn shutdown(mut self) -> Result<(StagePipelineEngine, usize), ServiceError> {
        let (done, rx) = oneshot::channel();
        self.send(ServiceCommand::Shutdown { done })?;
        let cancelled = rx.await.map_err(|_| ServiceError::Stopped)?;

        let handle = self.handle.take().ok_or(ServiceError::Stopped)?;
        let engine = handle.await.map_err(|e| {
            warn!(error = %e, "lifecycle service task failed");
            ServiceError::Stopped
        })?;
        info!(cancelled, "lifecycle service shutdown complete");
        Ok((engine, cancelled))
    }
}

impl Drop for LifecycleService {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let (done, _) = oneshot::channel();
            let _ = self.command_tx.send(ServiceCommand::Shutdown { done });
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

async fn run_service_loop(
    mut engine: StagePipelineEngine,
    chains: StandardChains,
    mut command_rx: mpsc::UnboundedReceiver<ServiceCommand>,
    reap_interval: Duration,
) -> StagePipelineEngine {
    let mut reap = tokio::time::interval(reap_interval);
    reap.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        let deadline = engine.next_deadline();

        tokio::select! {
            _ = sleep_until_deadline(deadline) => {
                engine.expire_timeouts(Instant::now());
            }

            _ = reap.tick() => {
                engine.reap_processes();
            }

            cmd = command_rx.recv() => {
                let Some(cmd) = cmd else {
                    warn!("all service handles dropped, shutting down");
                    engine.cancel_all();
                    break;
                };

                match cmd {
                    ServiceCommand::Submit { request, reply, chain } => {
                        let chain = chain.unwrap_or_else(|| chains.for_request(&request));
                        engine.submit(request, reply, chain);
                    }
                    ServiceCommand::ExternalReply { token, payload } => {
                        engine.on_external_reply(token, payload);
                    }
                    ServiceCommand::ReclaimComplete { uid, outcome } => {
                        engine.on_reclaim_complete(uid, outcome);
                    }
                    ServiceCommand::AppRegistered(app_id) => {
                        engine.on_app_registered(&app_id);
                    }
                    ServiceCommand::ProcessExited(pid) => {
                        engine.on_process_exited(pid);
                    }
                    ServiceCommand::SetReady(ready) => engine.set_ready(ready),
                    ServiceCommand::Cancel { uid, done } => {
                        let _ = done.send(engine.cancel(uid));
                    }
                    ServiceCommand::CancelAll { done } => {
                        let _ = done.send(engine.cancel_all());
                    }
                    ServiceCommand::Snapshot { done } => {
                        let _ = done.send(engine.snapshot());
                    }
                    ServiceCommand::Shutdown { done } => {
                        info!("lifecycle service shutting down");
                        let _ = done.send(engine.cancel_all());
                        break;
                    }
                }
            }
        }
        debug!(in_flight = engine.in_flight(), "service loop iteration");
    }

    engine
}
