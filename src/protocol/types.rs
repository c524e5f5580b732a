/*!
 * Native Protocol Types
 */

use crate::core::errors::{LifecycleError, LifecycleResult};
use crate::core::id::CorrelationToken;
use crate::core::limits::{NATIVE_INTERFACE_V1, NATIVE_INTERFACE_V2, NATIVE_INTERFACE_V3};
use crate::core::types::{AppId, Pid, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Native lifecycle protocol generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVersion {
    V1,
    V2,
    V3,
}

impl ProtocolVersion {
    /// Select the protocol for an app's declared native interface version
    ///
    /// Unknown versions are a configuration error for the task, never a
    /// silent fallback.
    pub fn from_declared(app_id: &str, declared: i32) -> LifecycleResult<Self> {
        match declared {
            NATIVE_INTERFACE_V1 => Ok(ProtocolVersion::V1),
            NATIVE_INTERFACE_V2 => Ok(ProtocolVersion::V2),
            NATIVE_INTERFACE_V3 => Ok(ProtocolVersion::V3),
            other => Err(LifecycleError::UnsupportedProtocol {
                app_id: app_id.to_string(),
                version: other,
            }),
        }
    }

    #[inline]
    pub fn as_i32(self) -> i32 {
        match self {
            ProtocolVersion::V1 => NATIVE_INTERFACE_V1,
            ProtocolVersion::V2 => NATIVE_INTERFACE_V2,
            ProtocolVersion::V3 => NATIVE_INTERFACE_V3,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_i32())
    }
}

/// Life status reported to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStatus {
    Launching,
    Relaunching,
    Running,
    Paused,
    Closing,
    Stopped,
}

/// A tracked native process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeClient {
    pub app_id: AppId,
    pub pid: Pid,
    pub version: ProtocolVersion,
    /// V2 apps register over the bus after they start; V1 apps never do
    pub registered: bool,
    pub status: LifeStatus,
    pub started_at: Timestamp,
}

/// Process command line for a fresh launch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchArguments {
    pub exec_path: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Result of a protocol operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeStep {
    /// Finished synchronously
    Done,
    /// Waiting for the app to answer the request behind `token`
    Pending {
        token: CorrelationToken,
        timeout: Duration,
    },
}

/// Signal delivered to a native process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessSignal {
    /// Ask the process to exit
    Terminate,
    /// Forced termination
    Kill,
}
