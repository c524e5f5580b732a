/*!
 * Native Protocol V3
 *
 * Reserved for the next native interface generation. Every operation fails
 * with `UnsupportedProtocol`.
 */

use super::traits::{NativeContext, NativeLifecycleProtocol};
use super::types::{LaunchArguments, NativeClient, NativeStep, ProtocolVersion};
use crate::apps::AppDescriptor;
use crate::core::errors::{LifecycleError, LifecycleResult};
use crate::task::Task;
use serde_json::Value;

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeV3;

fn unsupported(app_id: &str) -> LifecycleError {
    LifecycleError::UnsupportedProtocol {
        app_id: app_id.to_string(),
        version: ProtocolVersion::V3.as_i32(),
    }
}

impl NativeLifecycleProtocol for NativeV3 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V3
    }

    fn can_launch(&self, task: &Task) -> LifecycleResult<()> {
        Err(unsupported(&task.app_id))
    }

    fn check_launch_condition(
        &self,
        task: &Task,
        _client: Option<&NativeClient>,
    ) -> LifecycleResult<()> {
        Err(unsupported(&task.app_id))
    }

    fn build_launch_arguments(
        &self,
        _task: &Task,
        app: &AppDescriptor,
    ) -> LifecycleResult<LaunchArguments> {
        Err(unsupported(&app.id))
    }

    fn launch_from_closing_state(
        &self,
        _ctx: &mut NativeContext<'_>,
        _task: &mut Task,
        app: &AppDescriptor,
    ) -> LifecycleResult<NativeStep> {
        Err(unsupported(&app.id))
    }

    fn launch_from_running_state(
        &self,
        _ctx: &mut NativeContext<'_>,
        _task: &mut Task,
        client: &NativeClient,
        _app: &AppDescriptor,
    ) -> LifecycleResult<NativeStep> {
        Err(unsupported(&client.app_id))
    }

    fn close(
        &self,
        _ctx: &mut NativeContext<'_>,
        _task: &mut Task,
        client: &NativeClient,
    ) -> LifecycleResult<NativeStep> {
        Err(unsupported(&client.app_id))
    }

    fn pause(
        &self,
        _ctx: &mut NativeContext<'_>,
        client: &NativeClient,
        _params: &Value,
        _send_life_event: bool,
    ) -> LifecycleResult<()> {
        Err(unsupported(&client.app_id))
    }

    fn build_relaunch_params(&self, _task: &Task) -> Value {
        Value::Null
    }

    fn relaunch_acknowledged(
        &self,
        _ctx: &mut NativeContext<'_>,
        task: &mut Task,
        _payload: &Value,
    ) -> LifecycleResult<()> {
        Err(unsupported(&task.app_id))
    }

    fn close_acknowledged(
        &self,
        _ctx: &mut NativeContext<'_>,
        task: &mut Task,
        _payload: &Value,
    ) -> LifecycleResult<()> {
        Err(unsupported(&task.app_id))
    }

    fn close_timed_out(&self, _ctx: &mut NativeContext<'_>, task: &mut Task) -> LifecycleError {
        unsupported(&task.app_id)
    }
}
