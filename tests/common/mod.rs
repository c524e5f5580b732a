/*!
 * Shared test fixtures
 * Fake process controller, event recorder, and an engine harness
 */

#![allow(dead_code)]

use app_lifecycle::pipeline::{StageChain, StagePipelineEngine, StandardChains};
use app_lifecycle::protocol::{LaunchArguments, ProcessController, ProcessSignal};
use app_lifecycle::task::TaskReply;
use app_lifecycle::{
    AppDescriptor, ChannelTransport, Envelope, EventBus, LifecycleConfig, LifecycleEvent,
    LifecycleResult, ReclaimPolicy, ReplyObligation, StaticAppDirectory, Subscription, TaskRequest,
    TaskUid,
};
use app_lifecycle::core::types::Pid;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

pub const APP: &str = "com.example.app";

#[derive(Default)]
struct FakeState {
    next_pid: Pid,
    spawned: Vec<(String, Vec<String>)>,
    signals: Vec<(Pid, ProcessSignal)>,
    exited: Vec<Pid>,
    fail_spawn: bool,
}

/// In-memory process controller; clones share state
#[derive(Clone, Default)]
pub struct FakeProcesses {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProcesses {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state.lock().next_pid = 1000;
        fake
    }

    pub fn failing() -> Self {
        let fake = Self::new();
        fake.state.lock().fail_spawn = true;
        fake
    }

    /// (app id, argv) of every spawn, in order
    pub fn spawned(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().spawned.clone()
    }

    pub fn signals(&self) -> Vec<(Pid, ProcessSignal)> {
        self.state.lock().signals.clone()
    }

    /// Make `pid` show up in the next reap
    pub fn exit(&self, pid: Pid) {
        self.state.lock().exited.push(pid);
    }
}

impl ProcessController for FakeProcesses {
    fn spawn(&mut self, app: &AppDescriptor, args: &LaunchArguments) -> LifecycleResult<Pid> {
        let mut state = self.state.lock();
        if state.fail_spawn {
            return Err(app_lifecycle::LifecycleError::SpawnFailed {
                app_id: app.id.clone(),
                reason: "no such file".into(),
            });
        }
        state.next_pid += 1;
        let pid = state.next_pid;
        state.spawned.push((app.id.clone(), args.args.clone()));
        Ok(pid)
    }

    fn signal(&mut self, pid: Pid, signal: ProcessSignal) -> LifecycleResult<()> {
        self.state.lock().signals.push((pid, signal));
        Ok(())
    }

    fn reap(&mut self) -> Vec<Pid> {
        std::mem::take(&mut self.state.lock().exited)
    }
}

/// Records every event published on a bus
pub struct EventRecorder {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
    _subscription: Subscription,
}

impl EventRecorder {
    pub fn attach(bus: &EventBus) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let subscription = bus.subscribe(move |e| sink.lock().push(e.clone()));
        Self {
            events,
            _subscription: subscription,
        }
    }

    pub fn all(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn count(&self, pred: impl Fn(&LifecycleEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

pub fn is_running_app_added(e: &LifecycleEvent) -> bool {
    matches!(e, LifecycleEvent::RunningAppAdded { .. })
}

pub fn is_running_app_removed(e: &LifecycleEvent) -> bool {
    matches!(e, LifecycleEvent::RunningAppRemoved { .. })
}

pub fn is_reclaim_done(e: &LifecycleEvent) -> bool {
    matches!(e, LifecycleEvent::MemoryReclaimDone { .. })
}

/// Engine wired to fakes, plus handles to inspect them
pub struct Harness {
    pub engine: StagePipelineEngine,
    pub chains: StandardChains,
    pub processes: FakeProcesses,
    pub outbound: flume::Receiver<Envelope>,
    pub events: EventRecorder,
}

pub struct HarnessBuilder {
    apps: Vec<AppDescriptor>,
    config: LifecycleConfig,
    processes: FakeProcesses,
    reclaim: Option<Box<dyn ReclaimPolicy>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            apps: Vec::new(),
            config: LifecycleConfig::for_testing().with_memory_admission(false),
            processes: FakeProcesses::new(),
            reclaim: None,
        }
    }

    pub fn app(mut self, app: AppDescriptor) -> Self {
        self.apps.push(app);
        self
    }

    pub fn config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn processes(mut self, processes: FakeProcesses) -> Self {
        self.processes = processes;
        self
    }

    pub fn reclaim(mut self, policy: impl ReclaimPolicy + 'static) -> Self {
        self.reclaim = Some(Box::new(policy));
        self
    }

    pub fn build(self) -> Harness {
        let bus = EventBus::new();
        let events = EventRecorder::attach(&bus);
        let (transport, outbound) = ChannelTransport::new();
        let chains = StandardChains::new(&self.config).unwrap();

        let mut builder = StagePipelineEngine::builder()
            .with_config(self.config)
            .with_apps(Arc::new(StaticAppDirectory::from_descriptors(self.apps)))
            .with_transport(transport)
            .with_process_controller(self.processes.clone())
            .with_event_bus(bus);
        if let Some(policy) = self.reclaim {
            builder = builder.with_boxed_reclaim_policy(policy);
        }

        Harness {
            engine: builder.build(),
            chains,
            processes: self.processes,
            outbound,
            events,
        }
    }
}

impl Harness {
    /// Submit on the standard chain for the request
    pub fn submit(
        &mut self,
        request: impl Into<TaskRequest>,
    ) -> (TaskUid, oneshot::Receiver<TaskReply>) {
        let request = request.into();
        let chain = self.chains.for_request(&request);
        self.submit_on(request, chain)
    }

    pub fn submit_on(
        &mut self,
        request: impl Into<TaskRequest>,
        chain: Arc<StageChain>,
    ) -> (TaskUid, oneshot::Receiver<TaskReply>) {
        let (reply, rx) = ReplyObligation::channel();
        let uid = self.engine.submit(request, reply, chain);
        (uid, rx)
    }

    /// Requests sent to apps so far
    pub fn sent(&self) -> Vec<Envelope> {
        self.outbound.try_iter().collect()
    }
}

/// Reclaim policy that leaves every reclamation pending and records starts
#[derive(Clone, Default)]
pub struct RecordingReclaim {
    pub started: Arc<Mutex<Vec<TaskUid>>>,
}

impl ReclaimPolicy for RecordingReclaim {
    fn reclaim(&mut self, uid: TaskUid) -> app_lifecycle::memory::ReclaimStart {
        self.started.lock().push(uid);
        app_lifecycle::memory::ReclaimStart::Pending
    }
}

impl RecordingReclaim {
    pub fn started(&self) -> Vec<TaskUid> {
        self.started.lock().clone()
    }
}
