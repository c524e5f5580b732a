/*!
 * Native Protocol V2
 *
 * Message-driven apps. The process is spawned with a JSON launch document
 * and registers itself on the bus once it is up; relaunch, close, and pause
 * are then bus messages. A close that is not acknowledged within the
 * not-responding timeout escalates to a forced kill.
 */

use super::common;
use super::traits::{NativeContext, NativeLifecycleProtocol};
use super::types::{
    LaunchArguments, LifeStatus, NativeClient, NativeStep, ProcessSignal, ProtocolVersion,
};
use crate::apps::AppDescriptor;
use crate::core::errors::{LifecycleError, LifecycleResult};
use crate::task::Task;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Caller id stamped on launch documents issued by the kernel
pub const SYSTEM_CALLER_ID: &str = "@system_native_app";

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeV2;

impl NativeV2 {
    /// Launch document handed to the process as its only argument
    pub fn launch_document(task: &Task, app: &AppDescriptor) -> Value {
        let (display, keep_alive) = task
            .launch()
            .map(|l| (l.display, l.keep_alive))
            .unwrap_or((0, false));

        json!({
            "event": "launch",
            "appId": app.id,
            "interfaceVersion": ProtocolVersion::V2.as_i32(),
            "interfaceMethod": "registerApp",
            "parameters": common::launch_params(task),
            "@system_native_app": true,
            "callerId": SYSTEM_CALLER_ID,
            "displayId": display,
            "keepAlive": keep_alive,
        })
    }

    fn not_registered(app_id: &str) -> LifecycleError {
        LifecycleError::LaunchConditionUnmet {
            app_id: app_id.to_string(),
            reason: "native app has not registered yet".to_string(),
        }
    }
}

impl NativeLifecycleProtocol for NativeV2 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }

    fn can_launch(&self, _task: &Task) -> LifecycleResult<()> {
        Ok(())
    }

    fn check_launch_condition(
        &self,
        task: &Task,
        client: Option<&NativeClient>,
    ) -> LifecycleResult<()> {
        match client {
            // Still starting up: a second launch can neither spawn nor relaunch
            Some(c) if !c.registered && c.status == LifeStatus::Launching => {
                Err(Self::not_registered(&task.app_id))
            }
            _ => Ok(()),
        }
    }

    fn build_launch_arguments(
        &self,
        task: &Task,
        app: &AppDescriptor,
    ) -> LifecycleResult<LaunchArguments> {
        let display = task.launch().map(|l| l.display).unwrap_or(0);
        Ok(LaunchArguments {
            exec_path: app.exec_path.clone(),
            args: vec![Self::launch_document(task, app).to_string()],
            env: vec![
                ("LIFECYCLE_APP_ID".to_string(), app.id.clone()),
                (
                    "LIFECYCLE_INTERFACE_VERSION".to_string(),
                    ProtocolVersion::V2.as_i32().to_string(),
                ),
                ("LIFECYCLE_DISPLAY_ID".to_string(), display.to_string()),
            ],
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
        common::spawn_client(ctx, task, app, &args, ProtocolVersion::V2, false)?;
        Ok(NativeStep::Done)
    }

    fn launch_from_running_state(
        &self,
        ctx: &mut NativeContext<'_>,
        task: &mut Task,
        client: &NativeClient,
        _app: &AppDescriptor,
    ) -> LifecycleResult<NativeStep> {
        if !client.registered {
            return Err(Self::not_registered(&client.app_id));
        }

        let payload = json!({
            "event": "relaunch",
            "appId": client.app_id,
            "parameters": self.build_relaunch_params(task),
        });
        let token = common::send_to_app(ctx, &client.app_id, "relaunch", payload)?;
        task.pid = Some(client.pid);
        common::set_status(ctx, &client.app_id, Some(task.uid), LifeStatus::Relaunching);

        debug!(uid = %task.uid, app_id = %client.app_id, token = %token, "relaunch sent");
        Ok(NativeStep::Pending {
            token,
            timeout: ctx.not_responding_timeout,
        })
    }

    fn close(
        &self,
        ctx: &mut NativeContext<'_>,
        task: &mut Task,
        client: &NativeClient,
    ) -> LifecycleResult<NativeStep> {
        task.pid = Some(client.pid);

        if !client.registered {
            // Nobody is listening on the bus yet
            info!(uid = %task.uid, app_id = %client.app_id, "closing unregistered app by kill");
            common::set_status(ctx, &client.app_id, Some(task.uid), LifeStatus::Closing);
            common::stop_client(ctx, client, Some(task.uid), ProcessSignal::Kill);
            return Ok(NativeStep::Done);
        }

        let reason = task
            .close()
            .map(|c| c.reason.clone())
            .unwrap_or_default();
        let payload = json!({
            "event": "close",
            "appId": client.app_id,
            "reason": reason,
            "memoryReclaim": task.is_memory_reclaim(),
        });
        let token = common::send_to_app(ctx, &client.app_id, "close", payload)?;
        common::set_status(ctx, &client.app_id, Some(task.uid), LifeStatus::Closing);

        Ok(NativeStep::Pending {
            token,
            timeout: ctx.not_responding_timeout,
        })
    }

    fn pause(
        &self,
        ctx: &mut NativeContext<'_>,
        client: &NativeClient,
        params: &Value,
        send_life_event: bool,
    ) -> LifecycleResult<()> {
        if !client.registered {
            return Err(Self::not_registered(&client.app_id));
        }

        let payload = json!({
            "event": "pause",
            "appId": client.app_id,
            "parameters": params,
        });
        // Acknowledgment is not awaited
        common::send_to_app(ctx, &client.app_id, "pause", payload)?;

        if let Some(tracked) = ctx.running.get_mut(&client.app_id) {
            tracked.status = LifeStatus::Paused;
        }
        if send_life_event {
            common::emit_status(ctx, &client.app_id, None, LifeStatus::Paused);
        }
        Ok(())
    }

    fn build_relaunch_params(&self, task: &Task) -> Value {
        let mut params = common::launch_params(task);
        if let (Value::Object(map), Some(launch)) = (&mut params, task.launch()) {
            if !launch.reason.is_empty() {
                map.insert("reason".to_string(), Value::String(launch.reason.clone()));
            }
        }
        params
    }

    fn close_acknowledged(
        &self,
        ctx: &mut NativeContext<'_>,
        task: &mut Task,
        payload: &Value,
    ) -> LifecycleResult<()> {
        if let Err(reason) = common::reply_accepted(payload) {
            warn!(uid = %task.uid, app_id = %task.app_id, reason = %reason, "close refused, forcing termination");
            if let Some(client) = ctx.running.get(&task.app_id).cloned() {
                common::stop_client(ctx, &client, Some(task.uid), ProcessSignal::Kill);
            }
        }
        // Otherwise the client stays Closing until its process exit is reaped
        Ok(())
    }

    fn close_timed_out(&self, ctx: &mut NativeContext<'_>, task: &mut Task) -> LifecycleError {
        warn!(
            uid = %task.uid,
            app_id = %task.app_id,
            timeout_ms = ctx.not_responding_timeout.as_millis() as u64,
            "native app not responding to close, escalating to kill"
        );
        if let Some(client) = ctx.running.get(&task.app_id).cloned() {
            common::stop_client(ctx, &client, Some(task.uid), ProcessSignal::Kill);
        }
        common::not_responding(ctx, &task.app_id)
    }
}
