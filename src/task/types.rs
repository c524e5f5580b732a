/*!
 * Task Types
 * Launch, close, and pause tasks and their terminal outcomes
 */

use super::reply::ReplyObligation;
use crate::core::errors::{ErrorCode, LifecycleError, LifecycleResult};
use crate::core::id::{CorrelationToken, TaskUid};
use crate::core::serde::{is_false, is_none, is_zero_u32};
use crate::core::types::{AppId, DisplayId, Pid};
use crate::protocol::ProtocolVersion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::SystemTime;

/// Inbound launch request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    pub app_id: AppId,
    #[serde(default)]
    pub display: DisplayId,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub show_splash: bool,
    #[serde(default)]
    pub show_spinner: bool,
    #[serde(default)]
    pub keep_alive: bool,
}

impl LaunchRequest {
    pub fn new(app_id: impl Into<AppId>) -> Self {
        Self {
            app_id: app_id.into(),
            display: 0,
            params: Value::Object(Default::default()),
            reason: String::new(),
            show_splash: false,
            show_spinner: false,
            keep_alive: false,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_display(mut self, display: DisplayId) -> Self {
        self.display = display;
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    #[must_use]
    pub fn with_ui_hints(mut self, show_splash: bool, show_spinner: bool) -> Self {
        self.show_splash = show_splash;
        self.show_spinner = show_spinner;
        self
    }

    #[must_use]
    pub fn keep_alive(mut self) -> Self {
        self.keep_alive = true;
        self
    }
}

/// Inbound close request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseRequest {
    pub app_id: AppId,
    #[serde(default)]
    pub pid: Option<Pid>,
    #[serde(default)]
    pub caller_id: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub memory_reclaim: bool,
}

impl CloseRequest {
    pub fn new(app_id: impl Into<AppId>, caller_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            pid: None,
            caller_id: caller_id.into(),
            reason: String::new(),
            memory_reclaim: false,
        }
    }

    /// Close issued by the memory manager to free memory
    pub fn for_memory_reclaim(app_id: impl Into<AppId>) -> Self {
        Self {
            reason: "memoryReclaim".to_string(),
            memory_reclaim: true,
            ..Self::new(app_id, "memory-manager")
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    #[must_use]
    pub fn with_pid(mut self, pid: Pid) -> Self {
        self.pid = Some(pid);
        self
    }
}

/// Inbound pause request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseRequest {
    pub app_id: AppId,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub send_life_event: bool,
}

impl PauseRequest {
    pub fn new(app_id: impl Into<AppId>) -> Self {
        Self {
            app_id: app_id.into(),
            params: Value::Object(Default::default()),
            send_life_event: true,
        }
    }
}

/// Any inbound lifecycle request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskRequest {
    Launch(LaunchRequest),
    Close(CloseRequest),
    Pause(PauseRequest),
}

impl TaskRequest {
    pub fn app_id(&self) -> &str {
        match self {
            TaskRequest::Launch(r) => &r.app_id,
            TaskRequest::Close(r) => &r.app_id,
            TaskRequest::Pause(r) => &r.app_id,
        }
    }

    pub fn kind(&self) -> TaskKindTag {
        match self {
            TaskRequest::Launch(_) => TaskKindTag::Launch,
            TaskRequest::Close(_) => TaskKindTag::Close,
            TaskRequest::Pause(_) => TaskKindTag::Pause,
        }
    }
}

impl From<LaunchRequest> for TaskRequest {
    fn from(r: LaunchRequest) -> Self {
        TaskRequest::Launch(r)
    }
}

impl From<CloseRequest> for TaskRequest {
    fn from(r: CloseRequest) -> Self {
        TaskRequest::Close(r)
    }
}

impl From<PauseRequest> for TaskRequest {
    fn from(r: PauseRequest) -> Self {
        TaskRequest::Pause(r)
    }
}

/// Task kind without payload, for events and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKindTag {
    Launch,
    Close,
    Pause,
}

impl TaskKindTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKindTag::Launch => "launch",
            TaskKindTag::Close => "close",
            TaskKindTag::Pause => "pause",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchDetails {
    pub display: DisplayId,
    pub params: Value,
    pub reason: String,
    pub show_splash: bool,
    pub show_spinner: bool,
    pub keep_alive: bool,
    /// Target of the most recent redirect, if any
    pub redirect_target: Option<AppId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseDetails {
    pub caller_id: String,
    pub reason: String,
    pub memory_reclaim: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PauseDetails {
    pub params: Value,
    pub send_life_event: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    Launch(LaunchDetails),
    Close(CloseDetails),
    Pause(PauseDetails),
}

/// Where a task is in the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Accepted, waiting for the engine to become ready
    Queued,
    /// Executing stages
    Staging,
    /// Waiting for an external reply
    Suspended,
}

/// Error recorded on a failed task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub code: ErrorCode,
    pub text: String,
}

impl From<&LifecycleError> for TaskError {
    fn from(err: &LifecycleError) -> Self {
        Self {
            code: err.code(),
            text: err.to_string(),
        }
    }
}

/// Terminal outcome of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success,
    Failed { code: ErrorCode, text: String },
}

impl TaskOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

/// A single in-flight lifecycle request
///
/// Owned by the task registry while in flight. The reply obligation travels
/// with the task and is satisfied exactly once when the task is finalized.
pub struct Task {
    pub uid: TaskUid,
    pub app_id: AppId,
    pub kind: TaskKind,
    pub state: TaskState,
    /// Name of the stage currently executing or awaited
    pub stage: Option<&'static str>,
    /// Dispatches issued within the current stage
    pub sub_stage: u32,
    pub error: Option<TaskError>,
    pub created_at: SystemTime,
    pub trace_id: String,
    pub correlation_token: Option<CorrelationToken>,
    pub redirects: u32,
    pub pid: Option<Pid>,
    protocol: Option<ProtocolVersion>,
    pub(crate) reply: ReplyObligation,
}

impl Task {
    pub fn new(uid: TaskUid, request: TaskRequest, reply: ReplyObligation) -> Self {
        let (app_id, kind, pid) = match request {
            TaskRequest::Launch(r) => (
                r.app_id,
                TaskKind::Launch(LaunchDetails {
                    display: r.display,
                    params: r.params,
                    reason: r.reason,
                    show_splash: r.show_splash,
                    show_spinner: r.show_spinner,
                    keep_alive: r.keep_alive,
                    redirect_target: None,
                }),
                None,
            ),
            TaskRequest::Close(r) => (
                r.app_id,
                TaskKind::Close(CloseDetails {
                    caller_id: r.caller_id,
                    reason: r.reason,
                    memory_reclaim: r.memory_reclaim,
                }),
                r.pid,
            ),
            TaskRequest::Pause(r) => (
                r.app_id,
                TaskKind::Pause(PauseDetails {
                    params: r.params,
                    send_life_event: r.send_life_event,
                }),
                None,
            ),
        };

        Self {
            uid,
            app_id,
            kind,
            state: TaskState::Queued,
            stage: None,
            sub_stage: 0,
            error: None,
            created_at: SystemTime::now(),
            trace_id: String::new(),
            correlation_token: None,
            redirects: 0,
            pid,
            protocol: None,
            reply,
        }
    }

    pub fn kind_tag(&self) -> TaskKindTag {
        match self.kind {
            TaskKind::Launch(_) => TaskKindTag::Launch,
            TaskKind::Close(_) => TaskKindTag::Close,
            TaskKind::Pause(_) => TaskKindTag::Pause,
        }
    }

    pub fn launch(&self) -> Option<&LaunchDetails> {
        match &self.kind {
            TaskKind::Launch(d) => Some(d),
            _ => None,
        }
    }

    pub fn launch_mut(&mut self) -> Option<&mut LaunchDetails> {
        match &mut self.kind {
            TaskKind::Launch(d) => Some(d),
            _ => None,
        }
    }

    pub fn close(&self) -> Option<&CloseDetails> {
        match &self.kind {
            TaskKind::Close(d) => Some(d),
            _ => None,
        }
    }

    pub fn pause(&self) -> Option<&PauseDetails> {
        match &self.kind {
            TaskKind::Pause(d) => Some(d),
            _ => None,
        }
    }

    #[inline]
    pub fn is_memory_reclaim(&self) -> bool {
        self.close().map_or(false, |c| c.memory_reclaim)
    }

    pub fn protocol(&self) -> Option<ProtocolVersion> {
        self.protocol
    }

    /// Bind the native protocol version; the binding never changes afterwards
    pub fn bind_protocol(&mut self, version: ProtocolVersion) -> LifecycleResult<()> {
        match self.protocol {
            None => {
                self.protocol = Some(version);
                Ok(())
            }
            Some(bound) if bound == version => Ok(()),
            Some(bound) => Err(LifecycleError::InvalidRequest(format!(
                "{} is bound to native protocol {} and cannot switch to {}",
                self.uid, bound, version
            ))),
        }
    }

    /// Serializable view for introspection
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            uid: self.uid,
            app_id: self.app_id.clone(),
            kind: self.kind_tag(),
            state: self.state,
            stage: self.stage,
            sub_stage: self.sub_stage,
            redirects: self.redirects,
            correlation_token: self.correlation_token,
            protocol: self.protocol,
            pid: self.pid,
            created_at: self.created_at,
            trace_id: self.trace_id.clone(),
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("uid", &self.uid)
            .field("app_id", &self.app_id)
            .field("kind", &self.kind_tag())
            .field("state", &self.state)
            .field("stage", &self.stage)
            .field("sub_stage", &self.sub_stage)
            .field("correlation_token", &self.correlation_token)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of an in-flight task
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub uid: TaskUid,
    pub app_id: AppId,
    pub kind: TaskKindTag,
    pub state: TaskState,
    #[serde(skip_serializing_if = "is_none")]
    pub stage: Option<&'static str>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub sub_stage: u32,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub redirects: u32,
    #[serde(skip_serializing_if = "is_none")]
    pub correlation_token: Option<CorrelationToken>,
    #[serde(skip_serializing_if = "is_none")]
    pub protocol: Option<ProtocolVersion>,
    #[serde(skip_serializing_if = "is_none")]
    pub pid: Option<Pid>,
    #[serde(with = "crate::core::serde::system_time_micros")]
    pub created_at: SystemTime,
    pub trace_id: String,
}

/// Reply document delivered to the original caller, exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReply {
    pub return_value: bool,
    pub app_id: AppId,
    pub uid: TaskUid,
    #[serde(skip_serializing_if = "is_none", default)]
    pub pid: Option<Pid>,
    #[serde(skip_serializing_if = "is_none", default)]
    pub error_code: Option<i32>,
    #[serde(skip_serializing_if = "is_none", default)]
    pub error_text: Option<String>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub memory_reclaim: bool,
}

impl TaskReply {
    pub fn success(task: &Task) -> Self {
        Self {
            return_value: true,
            app_id: task.app_id.clone(),
            uid: task.uid,
            pid: task.pid,
            error_code: None,
            error_text: None,
            memory_reclaim: task.is_memory_reclaim(),
        }
    }

    pub fn failure(task: &Task, code: ErrorCode, text: impl Into<String>) -> Self {
        Self {
            return_value: false,
            app_id: task.app_id.clone(),
            uid: task.uid,
            pid: task.pid,
            error_code: Some(code.as_i32()),
            error_text: Some(text.into()),
            memory_reclaim: task.is_memory_reclaim(),
        }
    }
}
