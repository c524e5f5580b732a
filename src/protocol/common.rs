/*!
 * Shared Adapter Operations
 *
 * Building blocks the versioned adapters compose. Every running-app and
 * life-status notification the kernel emits originates here.
 */

use super::traits::NativeContext;
use super::types::{LaunchArguments, LifeStatus, NativeClient, ProcessSignal, ProtocolVersion};
use crate::apps::AppDescriptor;
use crate::core::errors::{LifecycleError, LifecycleResult};
use crate::core::id::TaskUid;
use crate::core::types::{now_micros, Pid};
use crate::ipc::OutboundRequest;
use crate::monitoring::LifecycleEvent;
use crate::task::Task;
use serde_json::Value;
use tracing::{info, warn};

pub(super) fn emit_status(
    ctx: &NativeContext<'_>,
    app_id: &str,
    uid: Option<TaskUid>,
    status: LifeStatus,
) {
    ctx.bus.emit(LifecycleEvent::AppLifeStatusChanged {
        app_id: app_id.to_string(),
        uid,
        status,
    });
}

/// Update the tracked status and notify observers
pub(super) fn set_status(
    ctx: &mut NativeContext<'_>,
    app_id: &str,
    uid: Option<TaskUid>,
    status: LifeStatus,
) {
    if let Some(client) = ctx.running.get_mut(app_id) {
        client.status = status;
    }
    emit_status(ctx, app_id, uid, status);
}

/// A relaunch is over; a client still marked relaunching is running again
pub(super) fn settle_relaunch(ctx: &mut NativeContext<'_>, app_id: &str, uid: TaskUid) {
    let relaunching = ctx
        .running
        .get(app_id)
        .is_some_and(|c| c.status == LifeStatus::Relaunching);
    if relaunching {
        set_status(ctx, app_id, Some(uid), LifeStatus::Running);
    }
}

/// Spawn a process and start tracking it
pub(super) fn spawn_client(
    ctx: &mut NativeContext<'_>,
    task: &mut Task,
    app: &AppDescriptor,
    args: &LaunchArguments,
    version: ProtocolVersion,
    registered: bool,
) -> LifecycleResult<Pid> {
    emit_status(ctx, &app.id, Some(task.uid), LifeStatus::Launching);

    let pid = match ctx.processes.spawn(app, args) {
        Ok(pid) => pid,
        Err(e) => {
            emit_status(ctx, &app.id, Some(task.uid), LifeStatus::Stopped);
            return Err(e);
        }
    };

    // Registered clients are usable immediately; others wait for the app
    let status = if registered {
        LifeStatus::Running
    } else {
        LifeStatus::Launching
    };
    ctx.running.insert(NativeClient {
        app_id: app.id.clone(),
        pid,
        version,
        registered,
        status,
        started_at: now_micros(),
    });
    task.pid = Some(pid);

    ctx.bus.emit(LifecycleEvent::RunningAppAdded {
        app_id: app.id.clone(),
        pid,
        version,
    });
    if registered {
        emit_status(ctx, &app.id, Some(task.uid), LifeStatus::Running);
    }

    info!(uid = %task.uid, app_id = %app.id, pid, version = %version, "native app launched");
    Ok(pid)
}

/// Stop tracking a client and notify observers
pub(super) fn remove_client(
    ctx: &mut NativeContext<'_>,
    app_id: &str,
    uid: Option<TaskUid>,
) -> Option<NativeClient> {
    let client = ctx.running.remove(app_id)?;
    ctx.bus.emit(LifecycleEvent::RunningAppRemoved {
        app_id: client.app_id.clone(),
        pid: client.pid,
    });
    emit_status(ctx, app_id, uid, LifeStatus::Stopped);
    Some(client)
}

/// Deliver `signal` and drop the client regardless of delivery
pub(super) fn stop_client(
    ctx: &mut NativeContext<'_>,
    client: &NativeClient,
    uid: Option<TaskUid>,
    signal: ProcessSignal,
) {
    if let Err(e) = ctx.processes.signal(client.pid, signal) {
        warn!(app_id = %client.app_id, pid = client.pid, error = %e, "failed to signal native app");
    }
    remove_client(ctx, &client.app_id, uid);
}

/// Kill a leftover instance that was still shutting down
pub(super) fn retire_stale(ctx: &mut NativeContext<'_>, app_id: &str, uid: TaskUid) {
    if let Some(stale) = ctx.running.get(app_id).cloned() {
        warn!(uid = %uid, app_id, pid = stale.pid, "killing stale instance before launch");
        stop_client(ctx, &stale, Some(uid), ProcessSignal::Kill);
    }
}

/// Send a message to a registered native app
pub(super) fn send_to_app(
    ctx: &mut NativeContext<'_>,
    app_id: &str,
    method: &str,
    payload: Value,
) -> LifecycleResult<crate::core::id::CorrelationToken> {
    let token = ctx
        .transport
        .send(OutboundRequest::new(app_id, method, payload))?;
    Ok(token)
}

/// Whether an app's reply accepted the request
///
/// Replies without a `returnValue` count as accepted.
pub(super) fn reply_accepted(payload: &Value) -> Result<(), String> {
    match payload.get("returnValue").and_then(Value::as_bool) {
        Some(false) => Err(payload
            .get("errorText")
            .and_then(Value::as_str)
            .unwrap_or("request rejected by app")
            .to_string()),
        _ => Ok(()),
    }
}

/// Launch parameters of a launch task
pub(super) fn launch_params(task: &Task) -> Value {
    task.launch()
        .map(|l| l.params.clone())
        .unwrap_or(Value::Null)
}

pub(super) fn not_responding(ctx: &NativeContext<'_>, app_id: &str) -> LifecycleError {
    LifecycleError::NotResponding {
        app_id: app_id.to_string(),
        timeout_ms: ctx.not_responding_timeout.as_millis() as u64,
    }
}
