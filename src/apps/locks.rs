/*!
 * Execution Locks
 * Apps temporarily barred from launching (install, update, removal)
 */

use crate::core::types::AppId;
use ahash::RandomState;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Shared handle; clones observe the same lock set
#[derive(Clone, Default)]
pub struct ExecutionLocks {
    held: Arc<RwLock<HashSet<AppId, RandomState>>>,
}

impl ExecutionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the app was already locked
    pub fn lock(&self, app_id: impl Into<AppId>) -> bool {
        let app_id = app_id.into();
        debug!(app_id = %app_id, "execution lock acquired");
        self.held.write().insert(app_id)
    }

    pub fn unlock(&self, app_id: &str) -> bool {
        debug!(app_id = %app_id, "execution lock released");
        self.held.write().remove(app_id)
    }

    pub fn is_locked(&self, app_id: &str) -> bool {
        self.held.read().contains(app_id)
    }
}

impl std::fmt::Debug for ExecutionLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionLocks")
            .field("held", &self.held.read().len())
            .finish()
    }
}
