/*!
 * Native Protocol Traits
 */

use super::common;
use super::process::ProcessController;
use super::running::RunningApps;
use super::types::{LaunchArguments, LifeStatus, NativeClient, NativeStep, ProtocolVersion};
use crate::apps::AppDescriptor;
use crate::core::errors::{LifecycleError, LifecycleResult};
use crate::ipc::Transport;
use crate::monitoring::EventBus;
use crate::task::Task;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Collaborators an adapter may touch while executing an operation
pub struct NativeContext<'a> {
    pub transport: &'a mut dyn Transport,
    pub processes: &'a mut dyn ProcessController,
    pub running: &'a mut RunningApps,
    pub bus: &'a EventBus,
    pub not_responding_timeout: Duration,
}

/// How launch, close, pause, and relaunch are carried out for one native
/// process generation
///
/// `client` arguments are snapshots; adapters update the tracked record
/// through `ctx.running`.
pub trait NativeLifecycleProtocol: Send + Sync {
    fn version(&self) -> ProtocolVersion;

    /// Whether this generation can launch at all
    fn can_launch(&self, task: &Task) -> LifecycleResult<()>;

    /// Policy check against the currently tracked instance, if any
    fn check_launch_condition(&self, task: &Task, client: Option<&NativeClient>)
        -> LifecycleResult<()>;

    fn build_launch_arguments(
        &self,
        task: &Task,
        app: &AppDescriptor,
    ) -> LifecycleResult<LaunchArguments>;

    /// Fresh launch; any instance still shutting down is killed first
    fn launch_from_closing_state(
        &self,
        ctx: &mut NativeContext<'_>,
        task: &mut Task,
        app: &AppDescriptor,
    ) -> LifecycleResult<NativeStep>;

    /// Relaunch in place of a running instance
    fn launch_from_running_state(
        &self,
        ctx: &mut NativeContext<'_>,
        task: &mut Task,
        client: &NativeClient,
        app: &AppDescriptor,
    ) -> LifecycleResult<NativeStep>;

    fn close(
        &self,
        ctx: &mut NativeContext<'_>,
        task: &mut Task,
        client: &NativeClient,
    ) -> LifecycleResult<NativeStep>;

    fn pause(
        &self,
        ctx: &mut NativeContext<'_>,
        client: &NativeClient,
        params: &Value,
        send_life_event: bool,
    ) -> LifecycleResult<()>;

    fn build_relaunch_params(&self, task: &Task) -> Value;

    /// The app answered a pending relaunch
    fn relaunch_acknowledged(
        &self,
        ctx: &mut NativeContext<'_>,
        task: &mut Task,
        payload: &Value,
    ) -> LifecycleResult<()> {
        let accepted = common::reply_accepted(payload);
        common::settle_relaunch(ctx, &task.app_id, task.uid);
        accepted.map_err(|reason| LifecycleError::LaunchConditionUnmet {
            app_id: task.app_id.clone(),
            reason,
        })
    }

    /// A pending relaunch got no answer in time
    fn relaunch_timed_out(
        &self,
        ctx: &mut NativeContext<'_>,
        task: &mut Task,
        after: Duration,
    ) -> LifecycleError {
        warn!(uid = %task.uid, app_id = %task.app_id, "relaunch not acknowledged");
        common::settle_relaunch(ctx, &task.app_id, task.uid);
        LifecycleError::NotResponding {
            app_id: task.app_id.clone(),
            timeout_ms: after.as_millis() as u64,
        }
    }

    /// The app answered a pending close
    fn close_acknowledged(
        &self,
        _ctx: &mut NativeContext<'_>,
        _task: &mut Task,
        _payload: &Value,
    ) -> LifecycleResult<()> {
        Ok(())
    }

    /// A pending close got no answer in time
    fn close_timed_out(&self, ctx: &mut NativeContext<'_>, task: &mut Task) -> LifecycleError;

    /// The app announced itself on the bus
    fn registered(&self, ctx: &mut NativeContext<'_>, app_id: &str) {
        if let Some(client) = ctx.running.get_mut(app_id) {
            client.registered = true;
        }
        common::set_status(ctx, app_id, None, LifeStatus::Running);
    }

    /// The process behind `client` exited
    fn process_exited(&self, ctx: &mut NativeContext<'_>, client: &NativeClient) {
        common::remove_client(ctx, &client.app_id, None);
    }
}
