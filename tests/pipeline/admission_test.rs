/*!
 * Memory Admission Property Tests
 * At most one reclamation in flight, started in FIFO order
 */

use crate::common::RecordingReclaim;
use app_lifecycle::memory::ReclaimOutcome;
use app_lifecycle::{MemoryAdmissionQueue, TaskUid};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Enqueue,
    CompleteHead,
    Cancel(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Enqueue),
        2 => Just(Op::CompleteHead),
        1 => (0usize..16).prop_map(Op::Cancel),
    ]
}

/// Owner drain loop: deliver completions, then step
fn drain(queue: &mut MemoryAdmissionQueue, done: &mut Vec<TaskUid>) {
    loop {
        if let Some((uid, _)) = queue.take_completed() {
            done.push(uid);
            continue;
        }
        if queue.needs_step() {
            queue.process_next();
            continue;
        }
        break;
    }
}

proptest! {
    #[test]
    fn prop_single_in_flight_fifo(ops in proptest::collection::vec(op(), 1..64)) {
        let policy = RecordingReclaim::default();
        let mut queue = MemoryAdmissionQueue::new(Box::new(policy.clone()));
        let mut next = 1u64;
        let mut enqueued = Vec::new();
        let mut cancelled = Vec::new();
        let mut done = Vec::new();

        for op in ops {
            match op {
                Op::Enqueue => {
                    let uid = TaskUid(next);
                    next += 1;
                    queue.enqueue(uid);
                    enqueued.push(uid);
                }
                Op::CompleteHead => {
                    if let Some(head) = queue.in_flight() {
                        prop_assert!(queue.complete(head, ReclaimOutcome::Reclaimed));
                    }
                }
                Op::Cancel(i) => {
                    if let Some(&uid) = enqueued.get(i) {
                        if queue.cancel(uid) {
                            cancelled.push(uid);
                        }
                    }
                }
            }
            drain(&mut queue, &mut done);

            let started = policy.started();
            // Every start except the current head has finished or been cancelled
            let open: Vec<_> = started
                .iter()
                .filter(|u| !done.contains(u) && !cancelled.contains(u))
                .collect();
            prop_assert!(open.len() <= 1);
            if let Some(head) = queue.in_flight() {
                prop_assert_eq!(open, vec![&head]);
            }
            // Nothing stalls while entries are waiting
            prop_assert!(queue.is_empty() || queue.in_flight().is_some());
        }

        // Starts follow enqueue order
        let started = policy.started();
        let mut sorted = started.clone();
        sorted.sort();
        prop_assert_eq!(started, sorted);
        // Completion signals arrive in start order
        let mut in_order = done.clone();
        in_order.sort();
        prop_assert_eq!(done, in_order);
    }
}
