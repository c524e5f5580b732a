/*!
 * Standard Stages
 *
 * Default launch, close, and pause policy expressed as stage chains.
 */

use super::context::StageContext;
use super::stage::{Dispatch, Stage, StageChain, StageReply, Verdict};
use crate::core::config::LifecycleConfig;
use crate::core::errors::{ChainError, LifecycleError, LifecycleResult};
use crate::memory::ReclaimOutcome;
use crate::protocol::{protocol_for, LifeStatus, NativeClient, NativeStep, ProtocolVersion};
use crate::task::{Task, TaskRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const RESOLVE_REDIRECT: &str = "resolve_redirect";
pub const EXECUTION_LOCK: &str = "execution_lock";
pub const MEMORY_ADMISSION: &str = "memory_admission";
pub const NATIVE_LAUNCH: &str = "native_launch";
pub const NATIVE_CLOSE: &str = "native_close";
pub const NATIVE_PAUSE: &str = "native_pause";

/// Follow the descriptor's redirect, if it declares one
pub fn resolve_redirect() -> Stage {
    Stage::direct(RESOLVE_REDIRECT, |task, ctx| match ctx.app(&task.app_id) {
        Ok(app) => match app.redirect {
            Some(target) if target != task.app_id => Verdict::Redirect(target),
            _ => Verdict::Continue,
        },
        Err(e) => Verdict::Error(e),
    })
}

/// Refuse locked apps and apps held by an execution lock
pub fn execution_lock() -> Stage {
    Stage::direct(EXECUTION_LOCK, |task, ctx| {
        let result = ctx.app(&task.app_id).and_then(|app| {
            if app.locked {
                Err(LifecycleError::Locked(app.id))
            } else if ctx.locks.is_locked(&app.id) {
                Err(LifecycleError::ExecutionLocked(app.id))
            } else {
                Ok(())
            }
        });
        result.into()
    })
}

/// Wait for the memory admission queue to reclaim on the task's behalf
pub fn memory_admission() -> Stage {
    Stage::async_call(
        MEMORY_ADMISSION,
        |task, ctx| {
            let token = ctx.issue_local_token();
            let position = ctx.memory.enqueue(task.uid);
            debug!(uid = %task.uid, position, "awaiting memory admission");
            Dispatch::Await {
                token,
                timeout: None,
            }
        },
        |task, reply, ctx| match reply {
            StageReply::Payload(payload) => {
                if let Ok(ReclaimOutcome::Failed(reason)) =
                    serde_json::from_value::<ReclaimOutcome>(payload)
                {
                    warn!(uid = %task.uid, reason = %reason, "proceeding after failed reclamation");
                }
                Verdict::Continue
            }
            StageReply::TimedOut { after } => {
                ctx.memory.cancel(task.uid);
                Verdict::Error(timed_out(MEMORY_ADMISSION, after))
            }
        },
    )
}

/// Launch through the protocol matching the app's declared interface
pub fn native_launch() -> Stage {
    Stage::async_call(
        NATIVE_LAUNCH,
        |task, ctx| step_dispatch(launch(task, ctx)),
        |task, reply, ctx| {
            let Some(version) = task.protocol() else {
                return Verdict::Error(unbound(task));
            };
            match reply {
                StageReply::Payload(payload) => protocol_for(version)
                    .relaunch_acknowledged(&mut ctx.native(), task, &payload)
                    .into(),
                StageReply::TimedOut { after } => Verdict::Error(
                    protocol_for(version).relaunch_timed_out(&mut ctx.native(), task, after),
                ),
            }
        },
    )
}

/// Close the running instance through its protocol
pub fn native_close() -> Stage {
    Stage::async_call(
        NATIVE_CLOSE,
        |task, ctx| step_dispatch(close(task, ctx)),
        |task, reply, ctx| {
            let Some(version) = task.protocol() else {
                return Verdict::Error(unbound(task));
            };
            let protocol = protocol_for(version);
            match reply {
                StageReply::Payload(payload) => protocol
                    .close_acknowledged(&mut ctx.native(), task, &payload)
                    .into(),
                StageReply::TimedOut { .. } => {
                    Verdict::Error(protocol.close_timed_out(&mut ctx.native(), task))
                }
            }
        },
    )
}

/// Pause the running instance
pub fn native_pause() -> Stage {
    Stage::direct(NATIVE_PAUSE, |task, ctx| pause(task, ctx).into())
}

fn launch(task: &mut Task, ctx: &mut StageContext) -> LifecycleResult<NativeStep> {
    let app = ctx.app(&task.app_id)?;
    let version = ProtocolVersion::from_declared(&app.id, app.native_interface_version)?;
    task.bind_protocol(version)?;

    let protocol = protocol_for(version);
    protocol.can_launch(task)?;

    let client = ctx.running.get(&task.app_id).cloned();
    protocol.check_launch_condition(task, client.as_ref())?;

    match client {
        Some(client) if client.status != LifeStatus::Closing => {
            protocol.launch_from_running_state(&mut ctx.native(), task, &client, &app)
        }
        _ => protocol.launch_from_closing_state(&mut ctx.native(), task, &app),
    }
}

fn close(task: &mut Task, ctx: &mut StageContext) -> LifecycleResult<NativeStep> {
    let client = running_client(task, ctx)?;
    if let Some(pid) = task.pid {
        if pid != client.pid {
            return Err(LifecycleError::NotRunning(format!("{} (pid {})", task.app_id, pid)));
        }
    }
    task.bind_protocol(client.version)?;
    protocol_for(client.version).close(&mut ctx.native(), task, &client)
}

fn pause(task: &mut Task, ctx: &mut StageContext) -> LifecycleResult<()> {
    let client = running_client(task, ctx)?;
    task.bind_protocol(client.version)?;
    let (params, send_life_event) = task
        .pause()
        .map(|p| (p.params.clone(), p.send_life_event))
        .unwrap_or_default();
    protocol_for(client.version).pause(&mut ctx.native(), &client, &params, send_life_event)
}

fn running_client(task: &Task, ctx: &StageContext) -> LifecycleResult<NativeClient> {
    ctx.running
        .get(&task.app_id)
        .filter(|c| c.status != LifeStatus::Stopped)
        .cloned()
        .ok_or_else(|| LifecycleError::NotRunning(task.app_id.clone()))
}

fn step_dispatch(step: LifecycleResult<NativeStep>) -> Dispatch {
    match step {
        Ok(NativeStep::Done) => Dispatch::Complete(Verdict::Continue),
        Ok(NativeStep::Pending { token, timeout }) => Dispatch::Await {
            token,
            timeout: Some(timeout),
        },
        Err(e) => Dispatch::Complete(Verdict::Error(e)),
    }
}

fn timed_out(stage: &str, after: Duration) -> LifecycleError {
    LifecycleError::StageTimeout {
        stage: stage.to_string(),
        timeout_ms: after.as_millis() as u64,
    }
}

fn unbound(task: &Task) -> LifecycleError {
    LifecycleError::InvalidRequest(format!("{} resumed without a bound protocol", task.uid))
}

/// Default chains for each request type
#[derive(Debug, Clone)]
pub struct StandardChains {
    pub launch: Arc<StageChain>,
    pub close: Arc<StageChain>,
    pub reclaim_close: Arc<StageChain>,
    pub pause: Arc<StageChain>,
}

impl StandardChains {
    pub fn new(config: &LifecycleConfig) -> Result<Self, ChainError> {
        let mut launch = vec![resolve_redirect(), execution_lock()];
        let mut reclaim_close = Vec::new();
        if config.memory_admission {
            launch.push(memory_admission());
            reclaim_close.push(memory_admission());
        }
        launch.push(native_launch());
        reclaim_close.push(native_close());

        Ok(Self {
            launch: StageChain::linear("launch", launch)?,
            close: StageChain::linear("close", vec![native_close()])?,
            reclaim_close: StageChain::linear("reclaim_close", reclaim_close)?,
            pause: StageChain::linear("pause", vec![native_pause()])?,
        })
    }

    /// Chain for an inbound request
    pub fn for_request(&self, request: &TaskRequest) -> Arc<StageChain> {
        match request {
            TaskRequest::Launch(_) => Arc::clone(&self.launch),
            TaskRequest::Close(c) if c.memory_reclaim => Arc::clone(&self.reclaim_close),
            TaskRequest::Close(_) => Arc::clone(&self.close),
            TaskRequest::Pause(_) => Arc::clone(&self.pause),
        }
    }
}
