/*!
 * Prerequisite Gate
 *
 * Aggregates independently started checks into a single pass/fail result.
 *
 * # Resolution
 *
 * - Any check reporting `Failed` resolves the gate `Failed` immediately
 * - The last outstanding check reporting `Passed` resolves it `Passed`
 * - The result callback fires exactly once; later reports are recorded but inert
 * - Resolved checks are torn down on the following tick, never while the
 *   gate is still applying the report that resolved it
 */

use super::check::{CheckReporter, PrerequisiteCheck};
use super::types::{CheckStatus, GateResult, StatusUpdate};
use crate::core::errors::GateError;
use crate::monitoring::{EventBus, LifecycleEvent};
use tracing::{debug, info, trace, warn};

/// Result callback type
pub type GateCallback = Box<dyn FnOnce(GateResult) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Resolved(GateResult),
}

struct Slot {
    name: String,
    status: CheckStatus,
    check: Option<Box<dyn PrerequisiteCheck>>,
}

pub struct PrerequisiteGate {
    slots: Vec<Slot>,
    phase: Phase,
    callback: Option<GateCallback>,
    tx: flume::Sender<StatusUpdate>,
    rx: flume::Receiver<StatusUpdate>,
    retired: Vec<Box<dyn PrerequisiteCheck>>,
    bus: Option<EventBus>,
}

impl PrerequisiteGate {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(GateResult) + Send + 'static,
    {
        let (tx, rx) = flume::unbounded();
        Self {
            slots: Vec::new(),
            phase: Phase::Idle,
            callback: Some(Box::new(callback)),
            tx,
            rx,
            retired: Vec::new(),
            bus: None,
        }
    }

    /// Publish `PrerequisiteResolved` on the given bus when resolving
    #[must_use]
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Register a check; only allowed before `run`
    pub fn register<C>(&mut self, check: C) -> Result<usize, GateError>
    where
        C: PrerequisiteCheck + 'static,
    {
        self.register_boxed(Box::new(check))
    }

    pub fn register_boxed(&mut self, check: Box<dyn PrerequisiteCheck>) -> Result<usize, GateError> {
        if self.phase != Phase::Idle {
            return Err(GateError::RegisterAfterRun(check.name().to_string()));
        }

        let index = self.slots.len();
        debug!(check = check.name(), index, "prerequisite check registered");
        self.slots.push(Slot {
            name: check.name().to_string(),
            status: CheckStatus::Ready,
            check: Some(check),
        });
        Ok(index)
    }

    /// Start every registered check
    ///
    /// Returns the result if the gate already resolved from synchronous reports.
    pub fn run(&mut self) -> Result<Option<GateResult>, GateError> {
        if self.phase != Phase::Idle {
            return Err(GateError::AlreadyStarted);
        }
        self.phase = Phase::Running;
        info!(checks = self.slots.len(), "prerequisite gate running");

        if self.slots.is_empty() {
            self.resolve(GateResult::Passed);
            return Ok(self.result());
        }

        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.status = CheckStatus::Running;
            if let Some(check) = slot.check.as_mut() {
                check.start(CheckReporter::new(index, self.tx.clone()));
            }
        }

        Ok(self.pump())
    }

    /// Apply all queued status reports
    pub fn pump(&mut self) -> Option<GateResult> {
        self.tick();
        while let Ok(update) = self.rx.try_recv() {
            self.apply(update);
        }
        self.result()
    }

    /// Drive the gate until it resolves, then perform deferred teardown
    pub async fn wait(&mut self) -> GateResult {
        if self.phase == Phase::Idle {
            if let Err(e) = self.run() {
                warn!(error = %e, "prerequisite gate failed to start");
            }
        }

        loop {
            if let Some(result) = self.pump() {
                tokio::task::yield_now().await;
                self.tick();
                return result;
            }

            // The gate keeps its own sender, so the channel never disconnects.
            if let Ok(update) = self.rx.recv_async().await {
                self.apply(update);
            }
        }
    }

    /// Destroy checks retired by an earlier resolution
    pub fn tick(&mut self) -> usize {
        let count = self.retired.len();
        if count > 0 {
            trace!(count, "tearing down resolved prerequisite checks");
            self.retired.clear();
        }
        count
    }

    pub fn result(&self) -> Option<GateResult> {
        match self.phase {
            Phase::Resolved(result) => Some(result),
            _ => None,
        }
    }

    pub fn status(&self, index: usize) -> Option<CheckStatus> {
        self.slots.get(index).map(|s| s.status)
    }

    pub fn check_count(&self) -> usize {
        self.slots.len()
    }

    /// Checks resolved but not yet torn down
    pub fn pending_teardown(&self) -> usize {
        self.retired.len()
    }

    fn apply(&mut self, update: StatusUpdate) {
        let phase = self.phase;
        let Some(slot) = self.slots.get_mut(update.index) else {
            warn!(index = update.index, "status report for unknown prerequisite check");
            return;
        };

        if slot.status.is_terminal() {
            warn!(
                check = %slot.name,
                from = ?slot.status,
                to = ?update.status,
                "ignoring transition out of terminal status"
            );
            return;
        }
        slot.status = update.status;
        debug!(check = %slot.name, status = ?update.status, "prerequisite status changed");

        if let Phase::Resolved(result) = phase {
            trace!(check = %slot.name, ?result, "gate already resolved, report has no effect");
            return;
        }

        match update.status {
            CheckStatus::Failed => self.resolve(GateResult::Failed),
            CheckStatus::Passed => {
                if self.slots.iter().all(|s| s.status == CheckStatus::Passed) {
                    self.resolve(GateResult::Passed);
                }
            }
            CheckStatus::Ready | CheckStatus::Running => {}
        }
    }

    fn resolve(&mut self, result: GateResult) {
        self.phase = Phase::Resolved(result);
        match result {
            GateResult::Passed => info!("prerequisite gate passed"),
            GateResult::Failed => {
                let failed: Vec<&str> = self
                    .slots
                    .iter()
                    .filter(|s| s.status == CheckStatus::Failed)
                    .map(|s| s.name.as_str())
                    .collect();
                warn!(failed = ?failed, "prerequisite gate failed");
            }
        }

        self.retired
            .extend(self.slots.iter_mut().filter_map(|s| s.check.take()));

        if let Some(callback) = self.callback.take() {
            callback(result);
        }
        if let Some(bus) = &self.bus {
            bus.emit(LifecycleEvent::PrerequisiteResolved { result });
        }
    }
}
