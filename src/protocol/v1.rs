/*!
 * Native Protocol V1
 *
 * Legacy signal-driven apps. Launch parameters travel as the single
 * command-line argument, relaunch is terminate-and-respawn, close is a
 * terminate signal, and pause is tracked locally only.
 */

use super::common;
use super::traits::{NativeContext, NativeLifecycleProtocol};
use super::types::{
    LaunchArguments, LifeStatus, NativeClient, NativeStep, ProcessSignal, ProtocolVersion,
};
use crate::apps::AppDescriptor;
use crate::core::errors::{LifecycleError, LifecycleResult};
use crate::task::Task;
use serde_json::Value;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeV1;

impl NativeLifecycleProtocol for NativeV1 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V1
    }

    fn can_launch(&self, _task: &Task) -> LifecycleResult<()> {
        Ok(())
    }

    fn check_launch_condition(
        &self,
        _task: &Task,
        _client: Option<&NativeClient>,
    ) -> LifecycleResult<()> {
        Ok(())
    }

    fn build_launch_arguments(
        &self,
        task: &Task,
        app: &AppDescriptor,
    ) -> LifecycleResult<LaunchArguments> {
        Ok(LaunchArguments {
            exec_path: app.exec_path.clone(),
            args: vec![common::launch_params(task).to_string()],
            env: Vec::new(),
        })
    }

    fn launch_from_closing_state(
        &self,
        ctx: &mut NativeContext<'_>,
        task: &mut Task,
        app: &AppDescriptor,
    ) -> LifecycleResult<NativeStep> {
        common::retire_stale(ctx, &app.id, task.uid);
        let args = self.build_launch_arguments(task, app)?;
        common::spawn_client(ctx, task, app, &args, ProtocolVersion::V1, true)?;
        Ok(NativeStep::Done)
    }

    fn launch_from_running_state(
        &self,
        ctx: &mut NativeContext<'_>,
        task: &mut Task,
        client: &NativeClient,
        app: &AppDescriptor,
    ) -> LifecycleResult<NativeStep> {
        info!(uid = %task.uid, app_id = %client.app_id, pid = client.pid, "relaunching by respawn");
        common::set_status(ctx, &client.app_id, Some(task.uid), LifeStatus::Relaunching);
        common::stop_client(ctx, client, Some(task.uid), ProcessSignal::Terminate);

        let args = LaunchArguments {
            exec_path: app.exec_path.clone(),
            args: vec![self.build_relaunch_params(task).to_string()],
            env: Vec::new(),
        };
        common::spawn_client(ctx, task, app, &args, ProtocolVersion::V1, true)?;
        Ok(NativeStep::Done)
    }

    fn close(
        &self,
        ctx: &mut NativeContext<'_>,
        task: &mut Task,
        client: &NativeClient,
    ) -> LifecycleResult<NativeStep> {
        common::set_status(ctx, &client.app_id, Some(task.uid), LifeStatus::Closing);
        task.pid = Some(client.pid);
        common::stop_client(ctx, client, Some(task.uid), ProcessSignal::Terminate);
        Ok(NativeStep::Done)
    }

    fn pause(
        &self,
        ctx: &mut NativeContext<'_>,
        client: &NativeClient,
        _params: &Value,
        send_life_event: bool,
    ) -> LifecycleResult<()> {
        if let Some(tracked) = ctx.running.get_mut(&client.app_id) {
            tracked.status = LifeStatus::Paused;
        }
        if send_life_event {
            common::emit_status(ctx, &client.app_id, None, LifeStatus::Paused);
        }
        Ok(())
    }

    fn build_relaunch_params(&self, task: &Task) -> Value {
        common::launch_params(task)
    }

    fn close_timed_out(&self, ctx: &mut NativeContext<'_>, task: &mut Task) -> LifecycleError {
        if let Some(client) = ctx.running.get(&task.app_id).cloned() {
            common::stop_client(ctx, &client, Some(task.uid), ProcessSignal::Kill);
        }
        common::not_responding(ctx, &task.app_id)
    }
}
