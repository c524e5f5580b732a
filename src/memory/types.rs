/*!
 * Memory Admission Types
 */

use crate::core::id::TaskUid;
use serde::{Deserialize, Serialize};

/// Queue entry: a task reference plus its enqueue order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionEntry {
    pub uid: TaskUid,
    pub seq: u64,
}

/// Result of one reclamation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum ReclaimOutcome {
    Reclaimed,
    Failed(String),
}

impl ReclaimOutcome {
    #[inline]
    pub fn is_reclaimed(&self) -> bool {
        matches!(self, ReclaimOutcome::Reclaimed)
    }
}

/// How a reclamation started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReclaimStart {
    /// Finished inline
    Finished(ReclaimOutcome),
    /// Completion arrives later through `MemoryAdmissionQueue::complete`
    Pending,
}

/// Admission queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionStats {
    pub enqueued: u64,
    pub reclaimed: u64,
    pub failed: u64,
    pub cancelled: u64,
}
