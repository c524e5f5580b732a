/*!
 * Prerequisite Checks
 * Check trait, status reporter, and closure-backed checks
 */

use super::types::{CheckStatus, StatusUpdate};
use tracing::trace;

/// An independently-resolvable condition the gate waits on
///
/// `start` may report synchronously through the reporter or hand the
/// reporter to some asynchronous producer and return immediately. A check
/// that never reports stalls the gate; timeouts are the check's own concern.
pub trait PrerequisiteCheck: Send {
    fn name(&self) -> &str;

    fn start(&mut self, reporter: CheckReporter);
}

/// Cloneable handle a check uses to report status transitions
///
/// Reports are queued and applied by the gate on its next pump, never inline,
/// so reporting from inside `start` cannot re-enter the gate.
#[derive(Clone)]
pub struct CheckReporter {
    index: usize,
    tx: flume::Sender<StatusUpdate>,
}

impl CheckReporter {
    pub(super) fn new(index: usize, tx: flume::Sender<StatusUpdate>) -> Self {
        Self { index, tx }
    }

    pub fn report(&self, status: CheckStatus) {
        if self.tx.send(StatusUpdate { index: self.index, status }).is_err() {
            trace!(index = self.index, ?status, "gate dropped, status report discarded");
        }
    }

    #[inline]
    pub fn pass(&self) {
        self.report(CheckStatus::Passed);
    }

    #[inline]
    pub fn fail(&self) {
        self.report(CheckStatus::Failed);
    }
}

type StartFn = Box<dyn FnMut(CheckReporter) + Send>;

/// Check backed by a closure
pub struct FnCheck {
    name: String,
    start: StartFn,
}

impl FnCheck {
    pub fn new<F>(name: impl Into<String>, start: F) -> Self
    where
        F: FnMut(CheckReporter) + Send + 'static,
    {
        Self {
            name: name.into(),
            start: Box::new(start),
        }
    }

    /// Check that evaluates a predicate synchronously on start
    pub fn predicate<P>(name: impl Into<String>, predicate: P) -> Self
    where
        P: Fn() -> bool + Send + 'static,
    {
        Self::new(name, move |reporter| {
            if predicate() {
                reporter.pass();
            } else {
                reporter.fail();
            }
        })
    }
}

impl PrerequisiteCheck for FnCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, reporter: CheckReporter) {
        (self.start)(reporter)
    }
}
