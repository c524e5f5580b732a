/*!
 * Memory Admission Queue
 *
 * FIFO, one-at-a-time admission for memory reclamation before launch.
 *
 * # Stepping
 *
 * `process_next` is the only operation that starts a reclamation. It never
 * calls itself: every completion (inline or through `complete`) only raises
 * `needs_step`, and the owner calls `process_next` again from its own drain
 * loop. Stack depth stays constant regardless of how many launches pile up.
 */

use super::traits::ReclaimPolicy;
use super::types::{AdmissionEntry, AdmissionStats, ReclaimOutcome, ReclaimStart};
use crate::core::id::TaskUid;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

pub struct MemoryAdmissionQueue {
    waiting: VecDeque<AdmissionEntry>,
    in_flight: Option<AdmissionEntry>,
    completed: VecDeque<(TaskUid, ReclaimOutcome)>,
    policy: Box<dyn ReclaimPolicy>,
    step_pending: bool,
    next_seq: u64,
    stats: AdmissionStats,
}

impl MemoryAdmissionQueue {
    pub fn new(policy: Box<dyn ReclaimPolicy>) -> Self {
        Self {
            waiting: VecDeque::new(),
            in_flight: None,
            completed: VecDeque::new(),
            policy,
            step_pending: false,
            next_seq: 0,
            stats: AdmissionStats::default(),
        }
    }

    /// Append to the tail; returns the entry's position (0 = next to run)
    pub fn enqueue(&mut self, uid: TaskUid) -> usize {
        let entry = AdmissionEntry {
            uid,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.waiting.push_back(entry);
        self.stats.enqueued += 1;

        if self.in_flight.is_none() {
            self.step_pending = true;
        }

        let position = self.waiting.len() - 1 + usize::from(self.in_flight.is_some());
        debug!(uid = %uid, position, "queued for memory admission");
        position
    }

    /// Remove `uid` wherever it is; no completion is signalled
    pub fn cancel(&mut self, uid: TaskUid) -> bool {
        if self.in_flight.map(|e| e.uid) == Some(uid) {
            self.in_flight = None;
            self.step_pending = !self.waiting.is_empty();
            self.stats.cancelled += 1;
            info!(uid = %uid, "cancelled in-flight memory reclamation");
            return true;
        }

        let before = self.waiting.len();
        self.waiting.retain(|e| e.uid != uid);
        let removed = self.waiting.len() != before;
        if removed {
            self.stats.cancelled += 1;
            debug!(uid = %uid, "removed from memory admission queue");
        }
        removed
    }

    /// Start reclaiming for the head entry, if nothing is in flight
    ///
    /// Returns the uid whose reclamation was started.
    pub fn process_next(&mut self) -> Option<TaskUid> {
        self.step_pending = false;
        if self.in_flight.is_some() {
            return None;
        }

        let entry = self.waiting.pop_front()?;
        info!(uid = %entry.uid, seq = entry.seq, "starting memory reclamation");

        match self.policy.reclaim(entry.uid) {
            ReclaimStart::Finished(outcome) => self.record(entry.uid, outcome),
            ReclaimStart::Pending => self.in_flight = Some(entry),
        }
        Some(entry.uid)
    }

    /// Report completion of the in-flight reclamation
    ///
    /// Completions for any other uid (canceled, never started) are ignored.
    pub fn complete(&mut self, uid: TaskUid, outcome: ReclaimOutcome) -> bool {
        match self.in_flight {
            Some(entry) if entry.uid == uid => {
                self.in_flight = None;
                self.record(uid, outcome);
                true
            }
            _ => {
                debug!(uid = %uid, "ignoring reclaim completion for non-head entry");
                false
            }
        }
    }

    /// Next "reclaim done" signal, in completion order
    pub fn take_completed(&mut self) -> Option<(TaskUid, ReclaimOutcome)> {
        self.completed.pop_front()
    }

    /// Whether the owner must call `process_next`
    #[inline]
    pub fn needs_step(&self) -> bool {
        self.step_pending && self.in_flight.is_none() && !self.waiting.is_empty()
    }

    /// Drop every entry without signalling completion
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.waiting.len() + usize::from(self.in_flight.is_some());
        self.waiting.clear();
        self.in_flight = None;
        self.completed.clear();
        self.step_pending = false;
        self.stats.cancelled += dropped as u64;
        if dropped > 0 {
            warn!(dropped, "memory admission queue cleared");
        }
        dropped
    }

    pub fn in_flight(&self) -> Option<TaskUid> {
        self.in_flight.map(|e| e.uid)
    }

    /// Entries waiting or in flight
    pub fn len(&self) -> usize {
        self.waiting.len() + usize::from(self.in_flight.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of `uid` (0 = in flight or next)
    pub fn position(&self, uid: TaskUid) -> Option<usize> {
        if self.in_flight() == Some(uid) {
            return Some(0);
        }
        let offset = usize::from(self.in_flight.is_some());
        self.waiting
            .iter()
            .position(|e| e.uid == uid)
            .map(|p| p + offset)
    }

    pub fn stats(&self) -> AdmissionStats {
        self.stats
    }

    fn record(&mut self, uid: TaskUid, outcome: ReclaimOutcome) {
        match &outcome {
            ReclaimOutcome::Reclaimed => self.stats.reclaimed += 1,
            ReclaimOutcome::Failed(reason) => {
                self.stats.failed += 1;
                warn!(uid = %uid, reason = %reason, "memory reclamation failed");
            }
        }
        self.completed.push_back((uid, outcome));
        self.step_pending = true;
    }
}

impl std::fmt::Debug for MemoryAdmissionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAdmissionQueue")
            .field("waiting", &self.waiting.len())
            .field("in_flight", &self.in_flight())
            .field("stats", &self.stats)
            .finish()
    }
}
