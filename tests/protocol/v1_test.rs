/*!
 * Native V1 Tests
 * Signal-driven launch, relaunch, close, and exit handling
 */

use crate::common::*;
use app_lifecycle::protocol::{LifeStatus, ProcessSignal};
use app_lifecycle::{AppDescriptor, CloseRequest, LaunchRequest, LifecycleEvent};
use pretty_assertions::assert_eq;
use serde_json::json;

fn harness() -> Harness {
    HarnessBuilder::new()
        .app(AppDescriptor::new(APP, "/usr/bin/example", 1))
        .build()
}

#[test]
fn test_launch_passes_params_as_argument() {
    let mut h = harness();

    let (_, mut rx) = h.submit(LaunchRequest::new(APP).with_params(json!({"page": "settings"})));
    assert!(rx.try_recv().unwrap().return_value);

    let spawned = h.processes.spawned();
    assert_eq!(spawned.len(), 1);
    let argv: serde_json::Value = serde_json::from_str(&spawned[0].1[0]).unwrap();
    assert_eq!(argv, json!({"page": "settings"}));

    let client = h.engine.running_apps().get(APP).unwrap().clone();
    assert!(client.registered);
    assert_eq!(client.status, LifeStatus::Running);
}

#[test]
fn test_relaunch_respawns() {
    let mut h = harness();
    let (_, mut rx) = h.submit(LaunchRequest::new(APP));
    let first_pid = rx.try_recv().unwrap().pid.unwrap();

    let (_, mut rx) = h.submit(LaunchRequest::new(APP).with_params(json!({"again": true})));
    let second_pid = rx.try_recv().unwrap().pid.unwrap();

    assert_ne!(first_pid, second_pid);
    assert_eq!(h.processes.signals(), vec![(first_pid, ProcessSignal::Terminate)]);
    assert_eq!(h.engine.running_apps().get(APP).unwrap().pid, second_pid);
    assert_eq!(h.events.count(is_running_app_added), 2);
    assert_eq!(h.events.count(is_running_app_removed), 1);
    assert_eq!(
        h.events.count(|e| matches!(
            e,
            LifecycleEvent::AppLifeStatusChanged {
                status: LifeStatus::Relaunching,
                ..
            }
        )),
        1
    );
}

#[test]
fn test_close_terminates() {
    let mut h = harness();
    let (_, mut rx) = h.submit(LaunchRequest::new(APP));
    let pid = rx.try_recv().unwrap().pid.unwrap();

    let (_, mut rx) = h.submit(CloseRequest::new(APP, "com.example.shell"));
    let reply = rx.try_recv().unwrap();
    assert!(reply.return_value);
    assert_eq!(reply.pid, Some(pid));
    assert_eq!(h.processes.signals(), vec![(pid, ProcessSignal::Terminate)]);
    assert!(h.engine.running_apps().is_empty());
}

#[test]
fn test_reaped_exit_removes_client() {
    let mut h = harness();
    let (_, mut rx) = h.submit(LaunchRequest::new(APP));
    let pid = rx.try_recv().unwrap().pid.unwrap();

    h.processes.exit(pid);
    h.processes.exit(99_999);
    assert_eq!(h.engine.reap_processes(), 1);

    assert!(h.engine.running_apps().is_empty());
    assert_eq!(h.events.count(is_running_app_removed), 1);
    assert_eq!(
        h.events.all().last(),
        Some(&LifecycleEvent::AppLifeStatusChanged {
            app_id: APP.into(),
            uid: None,
            status: LifeStatus::Stopped,
        })
    );
}
