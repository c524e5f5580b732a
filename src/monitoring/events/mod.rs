/*!
 * Event System
 * Strongly-typed lifecycle notifications for external observers
 */

use crate::core::id::TaskUid;
use crate::core::types::{AppId, Pid};
use crate::gate::GateResult;
use crate::protocol::{LifeStatus, ProtocolVersion};
use crate::task::{TaskKindTag, TaskOutcome};
use serde::{Deserialize, Serialize};

/// Event topic for subscription filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    AppLifeStatus,
    RunningApps,
    Prerequisite,
    Memory,
    Task,
}

/// One-shot lifecycle notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Emitted by native protocol adapters on every life status transition
    AppLifeStatusChanged {
        app_id: AppId,
        uid: Option<TaskUid>,
        status: LifeStatus,
    },

    /// A native process was spawned and is now tracked as running
    RunningAppAdded {
        app_id: AppId,
        pid: Pid,
        version: ProtocolVersion,
    },

    /// A native process is no longer tracked as running
    RunningAppRemoved { app_id: AppId, pid: Pid },

    /// The startup prerequisite gate resolved
    PrerequisiteResolved { result: GateResult },

    /// The admission queue finished reclaiming memory for a task
    MemoryReclaimDone { uid: TaskUid },

    /// A task reached a terminal outcome and replied to its caller
    TaskFinished {
        app_id: AppId,
        uid: TaskUid,
        kind: TaskKindTag,
        outcome: TaskOutcome,
    },
}

impl LifecycleEvent {
    pub fn topic(&self) -> Topic {
        match self {
            LifecycleEvent::AppLifeStatusChanged { .. } => Topic::AppLifeStatus,
            LifecycleEvent::RunningAppAdded { .. } | LifecycleEvent::RunningAppRemoved { .. } => {
                Topic::RunningApps
            }
            LifecycleEvent::PrerequisiteResolved { .. } => Topic::Prerequisite,
            LifecycleEvent::MemoryReclaimDone { .. } => Topic::Memory,
            LifecycleEvent::TaskFinished { .. } => Topic::Task,
        }
    }
}
