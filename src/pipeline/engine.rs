/*!
 * Stage Pipeline Engine
 *
 * Drives tasks through their stage chains.
 *
 * # Execution model
 *
 * The engine is a synchronous state machine owned by a single event loop.
 * Every entry point (`submit`, `on_external_reply`, `expire_timeouts`, ...)
 * only pushes work onto an internal FIFO and then drains it iteratively;
 * stage handlers never call back into the engine. A burst of replies or
 * admission completions therefore never deepens the stack.
 *
 * A task runs stages back to back until it finishes or an async stage
 * suspends it on a correlation token. Suspended tasks resume through
 * `on_external_reply`, through the memory admission queue, or with
 * `StageReply::TimedOut` when the stage deadline passes.
 */

use super::context::StageContext;
use super::stage::{Dispatch, StageChain, StageKind, StageReply, Verdict};
use crate::apps::{AppDirectory, ExecutionLocks, StaticAppDirectory};
use crate::core::config::LifecycleConfig;
use crate::core::errors::LifecycleError;
use crate::core::id::{CorrelationToken, TaskUid};
use crate::core::types::Pid;
use crate::ipc::{ChannelTransport, Transport};
use crate::memory::{MemoryAdmissionQueue, NoopReclaim, ReclaimOutcome, ReclaimPolicy};
use crate::monitoring::{EventBus, LifecycleEvent, TaskSpan};
use crate::protocol::{protocol_for, OsProcessController, ProcessController, RunningApps};
use crate::task::{
    LifecycleTaskRegistry, ReplyObligation, TaskOutcome, TaskRequest, TaskSnapshot, TaskState,
};
use ahash::RandomState;
use serde_json::json;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

enum Work {
    Run(TaskUid),
    Resume { uid: TaskUid, reply: StageReply },
}

struct Deadline {
    at: Instant,
    after: Duration,
}

pub struct StagePipelineEngine {
    registry: LifecycleTaskRegistry,
    ctx: StageContext,
    chains: HashMap<TaskUid, Arc<StageChain>, RandomState>,
    /// Accepted before the engine became ready
    queued: VecDeque<TaskUid>,
    deadlines: BTreeSet<(Instant, CorrelationToken)>,
    deadline_of: HashMap<CorrelationToken, Deadline, RandomState>,
    /// Admission waits whose reclamation has not started; armed on start
    admission_timeouts: HashMap<TaskUid, (CorrelationToken, Duration), RandomState>,
    work: VecDeque<Work>,
    ready: bool,
    spans: HashMap<TaskUid, TaskSpan, RandomState>,
}

impl StagePipelineEngine {
    pub fn builder() -> StagePipelineEngineBuilder {
        StagePipelineEngineBuilder::new()
    }

    // ------------------------------------------------------------------
    // Inbound operations
    // ------------------------------------------------------------------

    /// Accept a task and run it through `chain`
    ///
    /// The task runs immediately when the engine is ready, otherwise it
    /// stays queued until `set_ready(true)`.
    pub fn submit(
        &mut self,
        request: impl Into<TaskRequest>,
        reply: ReplyObligation,
        chain: Arc<StageChain>,
    ) -> TaskUid {
        let request = request.into();
        let kind = request.kind();
        let uid = self.registry.admit(request, reply);

        if let Some(task) = self.registry.get_mut(uid) {
            let span = TaskSpan::new(uid, &task.app_id, kind.as_str());
            task.trace_id = span.trace_id().to_string();
            info!(
                uid = %uid,
                app_id = %task.app_id,
                kind = kind.as_str(),
                chain = chain.name(),
                trace_id = %task.trace_id,
                "task accepted"
            );
            self.spans.insert(uid, span);
        }
        self.chains.insert(uid, chain);

        if self.ready {
            self.work.push_back(Work::Run(uid));
            self.drain();
        } else {
            debug!(uid = %uid, "engine not ready, task queued");
            self.queued.push_back(uid);
        }
        uid
    }

    /// Open or close the gate for queued tasks
    pub fn set_ready(&mut self, ready: bool) {
        if self.ready == ready {
            return;
        }
        self.ready = ready;
        info!(ready, queued = self.queued.len(), "engine readiness changed");

        if ready {
            while let Some(uid) = self.queued.pop_front() {
                self.work.push_back(Work::Run(uid));
            }
            self.drain();
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Feed a transport reply to the task suspended on `token`
    ///
    /// Unknown tokens (late replies, replies after cancellation, duplicates)
    /// are dropped and `false` is returned.
    pub fn on_external_reply(&mut self, token: CorrelationToken, payload: serde_json::Value) -> bool {
        if token.is_local() {
            debug!(token = %token, "ignoring external reply for a local token");
            return false;
        }
        let Some(uid) = self.registry.release_token(token) else {
            debug!(token = %token, "dropping reply for unknown correlation token");
            return false;
        };

        self.clear_deadline(token);
        self.work.push_back(Work::Resume {
            uid,
            reply: StageReply::Payload(payload),
        });
        self.drain();
        true
    }

    /// Report completion of a deferred memory reclamation
    pub fn on_reclaim_complete(&mut self, uid: TaskUid, outcome: ReclaimOutcome) -> bool {
        let accepted = self.ctx.memory.complete(uid, outcome);
        self.drain();
        accepted
    }

    /// A native app registered itself on the bus
    pub fn on_app_registered(&mut self, app_id: &str) -> bool {
        let Some(version) = self.ctx.running.get(app_id).map(|c| c.version) else {
            warn!(app_id, "registration from an app that is not tracked");
            return false;
        };
        protocol_for(version).registered(&mut self.ctx.native(), app_id);
        true
    }

    /// A native process exited
    pub fn on_process_exited(&mut self, pid: Pid) -> bool {
        let Some(client) = self.ctx.running.find_by_pid(pid).cloned() else {
            debug!(pid, "exit of an untracked process");
            return false;
        };
        info!(app_id = %client.app_id, pid, "native app exited");
        protocol_for(client.version).process_exited(&mut self.ctx.native(), &client);
        true
    }

    /// Poll the process controller for exits
    pub fn reap_processes(&mut self) -> usize {
        let exited = self.ctx.processes.reap();
        exited
            .into_iter()
            .filter(|pid| self.on_process_exited(*pid))
            .count()
    }

    /// Earliest pending stage deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.first().map(|(at, _)| *at)
    }

    /// Time out every suspension whose deadline is at or before `now`
    pub fn expire_timeouts(&mut self, now: Instant) -> usize {
        let mut expired = 0;

        while let Some(&(at, token)) = self.deadlines.first() {
            if at > now {
                break;
            }
            self.deadlines.remove(&(at, token));
            let after = self
                .deadline_of
                .remove(&token)
                .map(|d| d.after)
                .unwrap_or_default();

            if let Some(uid) = self.registry.release_token(token) {
                warn!(uid = %uid, token = %token, after_ms = after.as_millis() as u64, "stage timed out");
                self.work.push_back(Work::Resume {
                    uid,
                    reply: StageReply::TimedOut { after },
                });
                expired += 1;
            }
        }

        if expired > 0 {
            self.drain();
        }
        expired
    }

    /// Finalize one task with a cancellation error
    pub fn cancel(&mut self, uid: TaskUid) -> bool {
        if !self.registry.contains(uid) {
            return false;
        }
        self.finish(uid, Err(LifecycleError::Cancelled("cancelled by caller".into())));
        self.drain();
        true
    }

    /// Finalize every in-flight task with a cancellation error
    ///
    /// Queued and suspended tasks alike; all queues end empty. Replies that
    /// arrive later for their tokens are dropped as unknown.
    pub fn cancel_all(&mut self) -> usize {
        // Torn down, not completed: no reclaim-done signals
        self.ctx.memory.cancel_all();

        let mut uids: Vec<TaskUid> = self.registry.iter().map(|t| t.uid).collect();
        uids.sort();
        for uid in &uids {
            self.finish(*uid, Err(LifecycleError::Cancelled("shutdown".into())));
        }

        self.queued.clear();
        self.work.clear();
        self.deadlines.clear();
        self.deadline_of.clear();
        self.admission_timeouts.clear();

        if !uids.is_empty() {
            warn!(cancelled = uids.len(), "all in-flight tasks cancelled");
        }
        uids.len()
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Views of all in-flight tasks, ordered by uid
    pub fn snapshot(&self) -> Vec<TaskSnapshot> {
        let mut all: Vec<_> = self.registry.iter().map(|t| t.snapshot()).collect();
        all.sort_by_key(|s| s.uid);
        all
    }

    pub fn registry(&self) -> &LifecycleTaskRegistry {
        &self.registry
    }

    pub fn context(&self) -> &StageContext {
        &self.ctx
    }

    pub fn bus(&self) -> &EventBus {
        &self.ctx.bus
    }

    pub fn running_apps(&self) -> &RunningApps {
        &self.ctx.running
    }

    pub fn execution_locks(&self) -> &ExecutionLocks {
        &self.ctx.locks
    }

    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }

    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn drain(&mut self) {
        loop {
            if let Some(work) = self.work.pop_front() {
                match work {
                    Work::Run(uid) => self.run_stages(uid, None),
                    Work::Resume { uid, reply } => self.run_stages(uid, Some(reply)),
                }
                continue;
            }

            if let Some((uid, outcome)) = self.ctx.memory.take_completed() {
                self.ctx.bus.emit(LifecycleEvent::MemoryReclaimDone { uid });
                self.resume_admission(uid, outcome);
                continue;
            }

            if self.ctx.memory.needs_step() {
                if let Some(uid) = self.ctx.memory.process_next() {
                    self.admission_started(uid);
                }
                continue;
            }

            break;
        }
    }

    /// Execute stages for `uid` until it finishes or suspends
    #[instrument(level = "debug", skip(self, resume), fields(uid = %uid))]
    fn run_stages(&mut self, uid: TaskUid, mut resume: Option<StageReply>) {
        let Some(chain) = self.chains.get(&uid).cloned() else {
            return;
        };
        let span = self.spans.get(&uid).map(TaskSpan::span);
        let _entered = span.as_ref().map(|s| s.enter());

        loop {
            let Some(task) = self.registry.get_mut(uid) else {
                return;
            };

            if resume.is_none() && task.state == TaskState::Suspended {
                debug!(uid = %uid, "task already suspended, skipping run");
                return;
            }

            let stage_name = *task.stage.get_or_insert(chain.entry());
            let Some(stage) = chain.stage(stage_name) else {
                let err = LifecycleError::InvalidRequest(format!(
                    "stage {} missing from chain {}",
                    stage_name,
                    chain.name()
                ));
                self.finish(uid, Err(err));
                return;
            };
            task.state = TaskState::Staging;
            if let Some(span) = self.spans.get(&uid) {
                span.record_stage(stage_name);
            }

            let verdict = match (&stage.kind, resume.take()) {
                (StageKind::AsyncCall { response, .. }, Some(reply)) => {
                    debug!(uid = %uid, stage = stage_name, "resuming stage");
                    response(task, reply, &mut self.ctx)
                }
                (StageKind::Direct(_), Some(_)) => {
                    warn!(uid = %uid, stage = stage_name, "reply delivered to a direct stage");
                    Verdict::Error(LifecycleError::InvalidRequest(format!(
                        "direct stage {} cannot take a reply",
                        stage_name
                    )))
                }
                (StageKind::Direct(run), None) => {
                    debug!(uid = %uid, stage = stage_name, "running direct stage");
                    run(task, &mut self.ctx)
                }
                (StageKind::AsyncCall { request, .. }, None) => {
                    debug!(uid = %uid, stage = stage_name, "dispatching async stage");
                    task.sub_stage += 1;
                    let stage_timeout = stage.timeout;
                    match request(task, &mut self.ctx) {
                        Dispatch::Complete(verdict) => verdict,
                        Dispatch::Send { request, timeout } => {
                            match self.ctx.transport.send(request) {
                                Ok(token) => {
                                    self.suspend(uid, token, timeout.or(stage_timeout));
                                    return;
                                }
                                Err(e) => Verdict::Error(e.into()),
                            }
                        }
                        Dispatch::Await { token, timeout } => {
                            self.suspend(uid, token, timeout.or(stage_timeout));
                            return;
                        }
                    }
                }
            };

            if !self.apply(uid, &chain, stage_name, verdict) {
                return;
            }
        }
    }

    /// Apply a stage verdict; returns whether the task keeps running
    fn apply(
        &mut self,
        uid: TaskUid,
        chain: &StageChain,
        stage_name: &'static str,
        verdict: Verdict,
    ) -> bool {
        let max_redirects = self.ctx.config.max_redirects;
        let Some(task) = self.registry.get_mut(uid) else {
            return false;
        };

        match verdict {
            Verdict::Continue => match chain.stage(stage_name).and_then(|s| s.next) {
                Some(next) => {
                    task.stage = Some(next);
                    task.sub_stage = 0;
                    true
                }
                None => {
                    self.finish(uid, Ok(()));
                    false
                }
            },
            Verdict::Error(err) => {
                self.finish(uid, Err(err));
                false
            }
            Verdict::Redirect(target) => {
                task.redirects += 1;
                if task.redirects > max_redirects {
                    let err = LifecycleError::RedirectLoop {
                        app_id: target,
                        hops: task.redirects,
                    };
                    self.finish(uid, Err(err));
                    return false;
                }

                info!(
                    uid = %uid,
                    from = %task.app_id,
                    to = %target,
                    hops = task.redirects,
                    "redirecting task"
                );
                if let Some(launch) = task.launch_mut() {
                    launch.redirect_target = Some(target.clone());
                }
                task.app_id = target;
                task.stage = None;
                task.sub_stage = 0;
                true
            }
        }
    }

    fn suspend(&mut self, uid: TaskUid, token: CorrelationToken, timeout: Option<Duration>) {
        if let Err(e) = self.registry.bind_token(uid, token) {
            self.finish(uid, Err(LifecycleError::InvalidRequest(e.to_string())));
            return;
        }
        if let Some(task) = self.registry.get_mut(uid) {
            task.state = TaskState::Suspended;
        }

        let timeout = timeout.or(self.ctx.config.default_stage_timeout);
        if let Some(after) = timeout {
            // Queue position alone never times a task out
            let waiting_for_admission = token.is_local()
                && self.ctx.memory.position(uid).is_some()
                && self.ctx.memory.in_flight() != Some(uid);
            if waiting_for_admission {
                self.admission_timeouts.insert(uid, (token, after));
            } else {
                self.arm_deadline(token, after);
            }
        }
        debug!(
            uid = %uid,
            token = %token,
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "task suspended"
        );
    }

    fn arm_deadline(&mut self, token: CorrelationToken, after: Duration) {
        let at = Instant::now() + after;
        self.deadlines.insert((at, token));
        self.deadline_of.insert(token, Deadline { at, after });
    }

    /// The admission queue started reclaiming for `uid`
    fn admission_started(&mut self, uid: TaskUid) {
        if self.ctx.memory.in_flight() != Some(uid) {
            // Finished inline; the completion resumes the task
            return;
        }
        if let Some((token, after)) = self.admission_timeouts.remove(&uid) {
            debug!(uid = %uid, after_ms = after.as_millis() as u64, "admission deadline armed");
            self.arm_deadline(token, after);
        }
    }

    fn clear_deadline(&mut self, token: CorrelationToken) {
        if let Some(deadline) = self.deadline_of.remove(&token) {
            self.deadlines.remove(&(deadline.at, token));
        }
    }

    /// Resume the task waiting on memory admission for `uid`
    fn resume_admission(&mut self, uid: TaskUid, outcome: ReclaimOutcome) {
        let token = match self.registry.get(uid).and_then(|t| t.correlation_token) {
            Some(token) if token.is_local() => token,
            _ => {
                debug!(uid = %uid, "reclaim done for a task not awaiting admission");
                return;
            }
        };

        self.registry.release_token(token);
        self.clear_deadline(token);
        self.admission_timeouts.remove(&uid);
        let payload = serde_json::to_value(&outcome).unwrap_or_else(|_| json!({}));
        self.work.push_back(Work::Resume {
            uid,
            reply: StageReply::Payload(payload),
        });
    }

    /// Remove `uid` from every queue, reply exactly once, notify observers
    fn finish(&mut self, uid: TaskUid, result: Result<(), LifecycleError>) {
        self.queued.retain(|q| *q != uid);
        if let Some(token) = self.registry.get(uid).and_then(|t| t.correlation_token) {
            self.clear_deadline(token);
        }
        self.admission_timeouts.remove(&uid);
        self.ctx.memory.cancel(uid);
        self.chains.remove(&uid);

        let finalized = match &result {
            Ok(()) => self.registry.finalize(uid),
            Err(err) => self.registry.finalize_with_error(uid, err.code(), err.to_string()),
        };
        let span = self.spans.remove(&uid);

        let task = match finalized {
            Ok(task) => task,
            Err(_) => return,
        };
        let kind = task.kind_tag();

        let outcome = match task.error {
            None => TaskOutcome::Success,
            Some(e) => TaskOutcome::Failed {
                code: e.code,
                text: e.text,
            },
        };
        if let Some(span) = span {
            span.record_outcome(outcome.is_success());
        }
        if let TaskOutcome::Failed { code, text } = &outcome {
            warn!(uid = %uid, app_id = %task.app_id, code = code.as_i32(), error = %text, "task failed");
        }

        self.ctx.bus.emit(LifecycleEvent::TaskFinished {
            app_id: task.app_id,
            uid,
            kind,
            outcome,
        });
    }
}

impl std::fmt::Debug for StagePipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagePipelineEngine")
            .field("ready", &self.ready)
            .field("in_flight", &self.registry.len())
            .field("queued", &self.queued.len())
            .field("deadlines", &self.deadlines.len())
            .field("memory", &self.ctx.memory)
            .finish()
    }
}

/// Builder for [`StagePipelineEngine`]
pub struct StagePipelineEngineBuilder {
    config: LifecycleConfig,
    apps: Option<Arc<dyn AppDirectory>>,
    transport: Option<Box<dyn Transport>>,
    processes: Option<Box<dyn ProcessController>>,
    reclaim: Option<Box<dyn ReclaimPolicy>>,
    locks: Option<ExecutionLocks>,
    bus: Option<EventBus>,
    gated: bool,
}

impl StagePipelineEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: LifecycleConfig::default(),
            apps: None,
            transport: None,
            processes: None,
            reclaim: None,
            locks: None,
            bus: None,
            gated: false,
        }
    }

    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_apps(mut self, apps: Arc<dyn AppDirectory>) -> Self {
        self.apps = Some(apps);
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn with_process_controller(mut self, processes: impl ProcessController + 'static) -> Self {
        self.processes = Some(Box::new(processes));
        self
    }

    pub fn with_reclaim_policy(mut self, policy: impl ReclaimPolicy + 'static) -> Self {
        self.reclaim = Some(Box::new(policy));
        self
    }

    pub fn with_boxed_reclaim_policy(mut self, policy: Box<dyn ReclaimPolicy>) -> Self {
        self.reclaim = Some(policy);
        self
    }

    pub fn with_execution_locks(mut self, locks: ExecutionLocks) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Hold submitted tasks until `set_ready(true)`
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    pub fn build(self) -> StagePipelineEngine {
        let mut features = Vec::new();
        if self.apps.is_some() {
            features.push("apps");
        }
        if self.transport.is_some() {
            features.push("transport");
        }
        if self.processes.is_some() {
            features.push("processes");
        }
        if self.reclaim.is_some() {
            features.push("reclaim-policy");
        }
        if self.config.memory_admission {
            features.push("memory-admission");
        }
        if self.gated {
            features.push("gated");
        }

        let apps = self
            .apps
            .unwrap_or_else(|| Arc::new(StaticAppDirectory::new()));
        // Without a transport every send fails with `Closed`
        let transport = self
            .transport
            .unwrap_or_else(|| Box::new(ChannelTransport::new().0));
        let processes = self
            .processes
            .unwrap_or_else(|| Box::new(OsProcessController::new()));
        let memory =
            MemoryAdmissionQueue::new(self.reclaim.unwrap_or_else(|| Box::new(NoopReclaim)));

        info!("Lifecycle engine initialized with: {}", features.join(", "));

        StagePipelineEngine {
            registry: LifecycleTaskRegistry::with_history(self.config.finalized_history),
            ctx: StageContext::new(
                apps,
                transport,
                processes,
                memory,
                self.locks.unwrap_or_default(),
                self.bus.unwrap_or_default(),
                self.config,
            ),
            chains: HashMap::with_hasher(RandomState::new()),
            queued: VecDeque::new(),
            deadlines: BTreeSet::new(),
            deadline_of: HashMap::with_hasher(RandomState::new()),
            admission_timeouts: HashMap::with_hasher(RandomState::new()),
            work: VecDeque::new(),
            ready: !self.gated,
            spans: HashMap::with_hasher(RandomState::new()),
        }
    }
}

impl Default for StagePipelineEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
