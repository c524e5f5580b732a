/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::id::{CorrelationToken, TaskUid};
use crate::core::types::AppId;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable numeric codes carried in task replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ErrorCode {
    General = -1,
    AppNotFound = -101,
    UnsupportedProtocol = -102,
    Locked = -103,
    ExecutionLocked = -104,
    LaunchConditionUnmet = -105,
    NotRunning = -106,
    NotResponding = -107,
    StageTimeout = -108,
    RedirectLoop = -109,
    Cancelled = -110,
    SpawnFailed = -111,
    TransportFailed = -112,
    InvalidRequest = -113,
}

impl ErrorCode {
    #[inline]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn class(self) -> ErrorClass {
        match self {
            ErrorCode::AppNotFound | ErrorCode::UnsupportedProtocol => ErrorClass::Configuration,
            ErrorCode::Locked
            | ErrorCode::ExecutionLocked
            | ErrorCode::LaunchConditionUnmet
            | ErrorCode::NotRunning
            | ErrorCode::RedirectLoop
            | ErrorCode::InvalidRequest => ErrorClass::Policy,
            ErrorCode::NotResponding | ErrorCode::StageTimeout => ErrorClass::Timeout,
            ErrorCode::TransportFailed => ErrorClass::Transport,
            ErrorCode::Cancelled => ErrorClass::Cancellation,
            ErrorCode::General | ErrorCode::SpawnFailed => ErrorClass::Internal,
        }
    }
}

/// Coarse error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Configuration,
    Policy,
    Timeout,
    Transport,
    Cancellation,
    Internal,
}

/// Task-scoped lifecycle failure
///
/// Every failure inside the pipeline resolves to one of these on the task that
/// caused it; none of them propagate across task boundaries.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum LifecycleError {
    #[error("Application {0} not found")]
    #[diagnostic(
        code(lifecycle::app_not_found),
        help("The app descriptor lookup returned nothing. Check the app id.")
    )]
    AppNotFound(AppId),

    #[error("Native interface version {version} is not supported for {app_id}")]
    #[diagnostic(
        code(lifecycle::unsupported_protocol),
        help("Supported native interface versions are 1 and 2.")
    )]
    UnsupportedProtocol { app_id: AppId, version: i32 },

    #[error("Application {0} is locked")]
    #[diagnostic(code(lifecycle::locked))]
    Locked(AppId),

    #[error("Application {0} is locked for execution")]
    #[diagnostic(
        code(lifecycle::execution_locked),
        help("Another operation (install, update, removal) holds the execution lock.")
    )]
    ExecutionLocked(AppId),

    #[error("Launch condition not met for {app_id}: {reason}")]
    #[diagnostic(code(lifecycle::launch_condition))]
    LaunchConditionUnmet { app_id: AppId, reason: String },

    #[error("Application {0} is not running")]
    #[diagnostic(code(lifecycle::not_running))]
    NotRunning(AppId),

    #[error("Application {app_id} did not respond within {timeout_ms}ms")]
    #[diagnostic(
        code(lifecycle::not_responding),
        help("Forced termination was requested from the process supervisor.")
    )]
    NotResponding { app_id: AppId, timeout_ms: u64 },

    #[error("Stage {stage} timed out after {timeout_ms}ms")]
    #[diagnostic(code(lifecycle::stage_timeout))]
    StageTimeout { stage: String, timeout_ms: u64 },

    #[error("Redirect loop detected for {app_id} after {hops} hops")]
    #[diagnostic(
        code(lifecycle::redirect_loop),
        help("App descriptors redirect into each other. Fix the redirect targets.")
    )]
    RedirectLoop { app_id: AppId, hops: u32 },

    #[error("Task cancelled: {0}")]
    #[diagnostic(code(lifecycle::cancelled))]
    Cancelled(String),

    #[error("Failed to spawn {app_id}: {reason}")]
    #[diagnostic(code(lifecycle::spawn_failed))]
    SpawnFailed { app_id: AppId, reason: String },

    #[error("Transport failure: {0}")]
    #[diagnostic(code(lifecycle::transport))]
    Transport(String),

    #[error("Invalid request: {0}")]
    #[diagnostic(code(lifecycle::invalid_request))]
    InvalidRequest(String),
}

impl LifecycleError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LifecycleError::AppNotFound(_) => ErrorCode::AppNotFound,
            LifecycleError::UnsupportedProtocol { .. } => ErrorCode::UnsupportedProtocol,
            LifecycleError::Locked(_) => ErrorCode::Locked,
            LifecycleError::ExecutionLocked(_) => ErrorCode::ExecutionLocked,
            LifecycleError::LaunchConditionUnmet { .. } => ErrorCode::LaunchConditionUnmet,
            LifecycleError::NotRunning(_) => ErrorCode::NotRunning,
            LifecycleError::NotResponding { .. } => ErrorCode::NotResponding,
            LifecycleError::StageTimeout { .. } => ErrorCode::StageTimeout,
            LifecycleError::RedirectLoop { .. } => ErrorCode::RedirectLoop,
            LifecycleError::Cancelled(_) => ErrorCode::Cancelled,
            LifecycleError::SpawnFailed { .. } => ErrorCode::SpawnFailed,
            LifecycleError::Transport(_) => ErrorCode::TransportFailed,
            LifecycleError::InvalidRequest(_) => ErrorCode::InvalidRequest,
        }
    }

    #[inline]
    pub fn class(&self) -> ErrorClass {
        self.code().class()
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Task registry misuse
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum RegistryError {
    #[error("Task {0} was already finalized")]
    #[diagnostic(
        code(registry::already_finalized),
        help("A task replies exactly once. This is a bug in the caller.")
    )]
    AlreadyFinalized(TaskUid),

    #[error("Task {0} is not registered")]
    #[diagnostic(code(registry::unknown_task))]
    UnknownTask(TaskUid),

    #[error("Task {0} is already registered")]
    #[diagnostic(code(registry::duplicate_task))]
    DuplicateTask(TaskUid),

    #[error("Correlation token {0} is already bound")]
    #[diagnostic(code(registry::token_in_use))]
    TokenInUse(CorrelationToken),

    #[error("Reply obligation already satisfied")]
    #[diagnostic(code(registry::already_replied))]
    AlreadyReplied,
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Prerequisite gate misuse
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum GateError {
    #[error("Cannot register check {0}: gate already running")]
    #[diagnostic(code(gate::register_after_run))]
    RegisterAfterRun(String),

    #[error("Gate already started")]
    #[diagnostic(code(gate::already_started))]
    AlreadyStarted,
}

/// Stage chain construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ChainError {
    #[error("Stage chain {0} has no stages")]
    #[diagnostic(code(chain::empty))]
    Empty(String),

    #[error("Stage {0} is defined twice")]
    #[diagnostic(code(chain::duplicate_stage))]
    DuplicateStage(String),

    #[error("Stage {from} links to unknown stage {to}")]
    #[diagnostic(code(chain::dangling_link))]
    DanglingLink { from: String, to: String },

    #[error("Entry stage {0} is not defined")]
    #[diagnostic(code(chain::missing_entry))]
    MissingEntry(String),
}

/// Outbound transport failure
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum TransportError {
    #[error("Transport closed")]
    #[diagnostic(code(transport::closed))]
    Closed,

    #[error("Transport rejected request to {destination}: {reason}")]
    #[diagnostic(code(transport::rejected))]
    Rejected { destination: String, reason: String },
}

impl From<TransportError> for LifecycleError {
    fn from(err: TransportError) -> Self {
        LifecycleError::Transport(err.to_string())
    }
}

/// Service driver errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ServiceError {
    #[error("Lifecycle service is not running")]
    #[diagnostic(
        code(service::stopped),
        help("The service loop has shut down. No further commands are accepted.")
    )]
    Stopped,
}

/// Configuration and manifest loading errors
#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    #[diagnostic(code(config::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    #[diagnostic(code(config::parse), help("The app manifest must be a JSON array of descriptors."))]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
