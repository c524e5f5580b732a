/*!
 * Gate Types
 */

use serde::{Deserialize, Serialize};

/// Status of a single prerequisite check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Registered but not started
    Ready,
    /// Started, outcome pending
    Running,
    Passed,
    Failed,
}

impl CheckStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, CheckStatus::Passed | CheckStatus::Failed)
    }
}

/// Aggregated outcome of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateResult {
    Passed,
    Failed,
}

/// Status transition reported by a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub index: usize,
    pub status: CheckStatus,
}
