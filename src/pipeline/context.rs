/*!
 * Stage Context
 * Services a stage may use while it runs
 */

use crate::apps::{AppDescriptor, AppDirectory, ExecutionLocks};
use crate::core::config::LifecycleConfig;
use crate::core::errors::{LifecycleError, LifecycleResult};
use crate::core::id::{AtomicGenerator, CorrelationToken};
use crate::ipc::Transport;
use crate::memory::MemoryAdmissionQueue;
use crate::monitoring::EventBus;
use crate::protocol::{NativeContext, ProcessController, RunningApps};
use std::sync::Arc;

/// Everything the engine hands to stage functions
///
/// Owned by the engine; stages borrow it for the duration of one step.
pub struct StageContext {
    pub apps: Arc<dyn AppDirectory>,
    pub transport: Box<dyn Transport>,
    pub processes: Box<dyn ProcessController>,
    pub running: RunningApps,
    pub memory: MemoryAdmissionQueue,
    pub locks: ExecutionLocks,
    pub bus: EventBus,
    pub config: LifecycleConfig,
    local_tokens: AtomicGenerator<u64>,
}

impl StageContext {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        apps: Arc<dyn AppDirectory>,
        transport: Box<dyn Transport>,
        processes: Box<dyn ProcessController>,
        memory: MemoryAdmissionQueue,
        locks: ExecutionLocks,
        bus: EventBus,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            apps,
            transport,
            processes,
            running: RunningApps::new(),
            memory,
            locks,
            bus,
            config,
            local_tokens: AtomicGenerator::default(),
        }
    }

    /// Token for an in-process wait; never collides with transport tokens
    pub fn issue_local_token(&self) -> CorrelationToken {
        CorrelationToken::Local(self.local_tokens.next())
    }

    /// Descriptor lookup failing with `AppNotFound`
    pub fn app(&self, app_id: &str) -> LifecycleResult<AppDescriptor> {
        self.apps
            .get_app_by_id(app_id)
            .ok_or_else(|| LifecycleError::AppNotFound(app_id.to_string()))
    }

    /// Borrow the collaborators a native protocol adapter needs
    pub fn native(&mut self) -> NativeContext<'_> {
        NativeContext {
            transport: self.transport.as_mut(),
            processes: self.processes.as_mut(),
            running: &mut self.running,
            bus: &self.bus,
            not_responding_timeout: self.config.not_responding_timeout,
        }
    }
}
