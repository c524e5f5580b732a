/*!
 * Standard Chain Tests
 * Close and pause through the default chains, stage deadlines
 */

use crate::common::*;
use app_lifecycle::memory::ReclaimOutcome;
use app_lifecycle::protocol::{LifeStatus, ProcessSignal};
use app_lifecycle::{
    AppDescriptor, CloseRequest, ErrorCode, LaunchRequest, LifecycleConfig, LifecycleEvent,
    PauseRequest,
};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

#[test]
fn test_close_of_stopped_app_fails() {
    let mut h = HarnessBuilder::new()
        .app(AppDescriptor::new(APP, "/usr/bin/example", 1))
        .build();

    let (_, mut rx) = h.submit(CloseRequest::new(APP, "com.example.shell"));
    assert_eq!(
        rx.try_recv().unwrap().error_code,
        Some(ErrorCode::NotRunning.as_i32())
    );
}

#[test]
fn test_close_with_wrong_pid_fails() {
    let mut h = HarnessBuilder::new()
        .app(AppDescriptor::new(APP, "/usr/bin/example", 1))
        .build();
    let (_, mut rx) = h.submit(LaunchRequest::new(APP));
    let pid = rx.try_recv().unwrap().pid.unwrap();

    let (_, mut rx) = h.submit(CloseRequest::new(APP, "shell").with_pid(pid + 1));
    assert_eq!(
        rx.try_recv().unwrap().error_code,
        Some(ErrorCode::NotRunning.as_i32())
    );
    assert_eq!(h.engine.running_apps().len(), 1);

    let (_, mut rx) = h.submit(CloseRequest::new(APP, "shell").with_pid(pid));
    assert!(rx.try_recv().unwrap().return_value);
    assert_eq!(h.processes.signals(), vec![(pid, ProcessSignal::Terminate)]);
}

#[test]
fn test_pause_marks_client_paused() {
    let mut h = HarnessBuilder::new()
        .app(AppDescriptor::new(APP, "/usr/bin/example", 1))
        .build();
    h.submit(LaunchRequest::new(APP));
    h.events.clear();

    let (_, mut rx) = h.submit(PauseRequest::new(APP));
    assert!(rx.try_recv().unwrap().return_value);
    assert_eq!(
        h.engine.running_apps().get(APP).unwrap().status,
        LifeStatus::Paused
    );
    assert_eq!(
        h.events.count(|e| matches!(
            e,
            LifecycleEvent::AppLifeStatusChanged {
                status: LifeStatus::Paused,
                ..
            }
        )),
        1
    );
}

#[test]
fn test_admission_wait_times_out() {
    let reclaim = RecordingReclaim::default();
    let mut h = HarnessBuilder::new()
        .app(AppDescriptor::new(APP, "/usr/bin/example", 1))
        .config(LifecycleConfig::for_testing().with_stage_timeout(Some(Duration::from_millis(50))))
        .reclaim(reclaim.clone())
        .build();

    let (uid, mut rx) = h.submit(LaunchRequest::new(APP));
    assert_eq!(reclaim.started(), vec![uid]);
    assert_eq!(h.engine.context().memory.in_flight(), Some(uid));

    let deadline = h.engine.next_deadline().unwrap();
    assert_eq!(h.engine.expire_timeouts(deadline), 1);

    let reply = rx.try_recv().unwrap();
    assert_eq!(reply.error_code, Some(ErrorCode::StageTimeout.as_i32()));
    assert!(h.engine.context().memory.is_empty());
    assert!(h.processes.spawned().is_empty());
}

#[test]
fn test_admission_deadline_starts_when_reclamation_starts() {
    let reclaim = RecordingReclaim::default();
    let mut h = HarnessBuilder::new()
        .app(AppDescriptor::new("com.example.one", "/usr/bin/one", 1))
        .app(AppDescriptor::new("com.example.two", "/usr/bin/two", 1))
        .config(LifecycleConfig::new())
        .reclaim(reclaim.clone())
        .build();

    let submitted = Instant::now();
    let (head, mut head_rx) = h.submit(LaunchRequest::new("com.example.one"));
    let (next, mut next_rx) = h.submit(LaunchRequest::new("com.example.two"));
    assert_eq!(reclaim.started(), vec![head]);
    assert_eq!(h.engine.context().memory.position(next), Some(1));

    // Past the default stage timeout: only the stalled head expires
    assert_eq!(h.engine.expire_timeouts(submitted + Duration::from_secs(31)), 1);
    assert_eq!(
        head_rx.try_recv().unwrap().error_code,
        Some(ErrorCode::StageTimeout.as_i32())
    );
    assert!(next_rx.try_recv().is_err());
    assert_eq!(reclaim.started(), vec![head, next]);
    assert_eq!(h.engine.context().memory.in_flight(), Some(next));

    assert!(h.engine.on_reclaim_complete(next, ReclaimOutcome::Reclaimed));
    let reply = next_rx.try_recv().unwrap();
    assert!(reply.return_value);
    assert_eq!(h.processes.spawned().len(), 1);
    assert_eq!(h.processes.spawned()[0].0, "com.example.two");
}

#[test]
fn test_deadline_in_the_future_does_not_fire() {
    let mut h = HarnessBuilder::new()
        .app(AppDescriptor::new(APP, "/usr/bin/example", 2))
        .build();
    h.submit(LaunchRequest::new(APP));
    h.engine.on_app_registered(APP);

    let (_, mut rx) = h.submit(CloseRequest::new(APP, "shell"));
    assert_eq!(h.engine.expire_timeouts(Instant::now()), 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_snapshot_reports_suspended_stage() {
    let mut h = HarnessBuilder::new()
        .app(AppDescriptor::new(APP, "/usr/bin/example", 2))
        .build();
    h.submit(LaunchRequest::new(APP));
    h.engine.on_app_registered(APP);
    let (uid, _rx) = h.submit(CloseRequest::new(APP, "shell"));

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].uid, uid);
    assert_eq!(snapshot[0].stage, Some("native_close"));
    assert!(snapshot[0].correlation_token.is_some());
    assert!(!snapshot[0].trace_id.is_empty());
}
