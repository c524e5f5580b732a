/*!
 * Prerequisite Gate Tests
 * Exactly-once resolution under arbitrary report orderings
 */

use app_lifecycle::gate::{CheckReporter, CheckStatus, FnCheck, GateResult, PrerequisiteGate};
use app_lifecycle::{EventBus, LifecycleEvent};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

type Results = Arc<Mutex<Vec<GateResult>>>;
type Reporters = Arc<Mutex<Vec<Option<CheckReporter>>>>;

/// Gate with `n` checks that hand their reporters to the test
fn deferred_gate(n: usize) -> (PrerequisiteGate, Results, Reporters) {
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    let mut gate = PrerequisiteGate::new(move |r| sink.lock().push(r));

    let reporters: Reporters = Arc::new(Mutex::new(vec![None; n]));
    for i in 0..n {
        let slot = reporters.clone();
        gate.register(FnCheck::new(format!("check-{}", i), move |r| {
            slot.lock()[i] = Some(r);
        }))
        .unwrap();
    }
    (gate, results, reporters)
}

fn report(reporters: &Reporters, index: usize, pass: bool) {
    let reporter = reporters.lock()[index].clone().unwrap();
    if pass {
        reporter.pass();
    } else {
        reporter.fail();
    }
}

#[tokio::test]
async fn test_wait_resolves_from_async_reports() {
    let (mut gate, results, reporters) = deferred_gate(2);
    let bus = EventBus::new();
    let (_sub, events) = bus.subscribe_channel(None);
    gate = gate.with_events(bus);

    gate.run().unwrap();
    let producer = reporters.clone();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        report(&producer, 1, true);
        report(&producer, 0, true);
    });

    assert_eq!(gate.wait().await, GateResult::Passed);
    assert_eq!(*results.lock(), vec![GateResult::Passed]);
    assert_eq!(gate.pending_teardown(), 0);
    assert_eq!(
        events.try_recv().unwrap(),
        LifecycleEvent::PrerequisiteResolved {
            result: GateResult::Passed
        }
    );
}

#[test]
fn test_terminal_status_is_sticky() {
    let (mut gate, _, reporters) = deferred_gate(2);
    gate.run().unwrap();

    report(&reporters, 0, true);
    report(&reporters, 0, false);
    assert_eq!(gate.pump(), None);
    assert_eq!(gate.status(0), Some(CheckStatus::Passed));
    assert_eq!(gate.status(1), Some(CheckStatus::Running));
}

proptest! {
    #[test]
    fn prop_resolves_exactly_once(
        n in 1usize..6,
        reports in proptest::collection::vec((0usize..6, any::<bool>()), 0..24),
    ) {
        let (mut gate, results, reporters) = deferred_gate(n);
        gate.run().unwrap();

        let mut first: Vec<Option<bool>> = vec![None; n];
        for (index, pass) in reports {
            let index = index % n;
            first[index].get_or_insert(pass);
            report(&reporters, index, pass);
            gate.pump();
        }

        let results = results.lock().clone();
        prop_assert!(results.len() <= 1);

        let any_failed = first.iter().any(|f| *f == Some(false));
        let all_passed = first.iter().all(|f| *f == Some(true));
        if any_failed {
            prop_assert_eq!(results, vec![GateResult::Failed]);
        } else if all_passed {
            prop_assert_eq!(results, vec![GateResult::Passed]);
        } else {
            prop_assert!(results.is_empty());
            prop_assert_eq!(gate.result(), None);
        }
    }
}
