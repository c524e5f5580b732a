/*!
 * Memory Admission Traits
 * Reclamation policy abstraction
 */

use super::types::{ReclaimOutcome, ReclaimStart};
use crate::core::id::TaskUid;

/// Effect performed for the head of the admission queue
pub trait ReclaimPolicy: Send {
    /// Begin reclaiming memory on behalf of `uid`
    fn reclaim(&mut self, uid: TaskUid) -> ReclaimStart;
}

impl<F> ReclaimPolicy for F
where
    F: FnMut(TaskUid) -> ReclaimStart + Send,
{
    fn reclaim(&mut self, uid: TaskUid) -> ReclaimStart {
        self(uid)
    }
}

/// Reclaims nothing and finishes immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReclaim;

impl ReclaimPolicy for NoopReclaim {
    fn reclaim(&mut self, _uid: TaskUid) -> ReclaimStart {
        ReclaimStart::Finished(ReclaimOutcome::Reclaimed)
    }
}

/// Leaves every reclamation pending for an external memory manager
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferredReclaim;

impl ReclaimPolicy for DeferredReclaim {
    fn reclaim(&mut self, _uid: TaskUid) -> ReclaimStart {
        ReclaimStart::Pending
    }
}
