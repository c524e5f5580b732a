/*!
 * Native V2 Tests
 * Registration, message-driven relaunch and close, not-responding escalation
 */

use crate::common::*;
use app_lifecycle::protocol::{LifeStatus, ProcessSignal};
use app_lifecycle::{
    AppDescriptor, CloseRequest, ErrorCode, LaunchRequest, LifecycleConfig, LifecycleEvent,
    PauseRequest,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

fn harness() -> Harness {
    HarnessBuilder::new()
        .app(AppDescriptor::new(APP, "/usr/bin/example", 2))
        .build()
}

/// Launch and register; returns the pid
fn running(h: &mut Harness) -> u32 {
    let (_, mut rx) = h.submit(LaunchRequest::new(APP));
    let pid = rx.try_recv().unwrap().pid.unwrap();
    assert!(h.engine.on_app_registered(APP));
    pid
}

#[test]
fn test_launch_waits_for_registration() {
    let mut h = harness();

    let (_, mut rx) = h.submit(LaunchRequest::new(APP).with_display(1));
    assert!(rx.try_recv().unwrap().return_value);

    let doc: serde_json::Value = serde_json::from_str(&h.processes.spawned()[0].1[0]).unwrap();
    assert_eq!(doc["interfaceMethod"], "registerApp");
    assert_eq!(doc["displayId"], 1);

    let client = h.engine.running_apps().get(APP).unwrap().clone();
    assert!(!client.registered);
    assert_eq!(client.status, LifeStatus::Launching);

    // A second launch before registration is refused
    let (_, mut rx) = h.submit(LaunchRequest::new(APP));
    assert_eq!(
        rx.try_recv().unwrap().error_code,
        Some(ErrorCode::LaunchConditionUnmet.as_i32())
    );

    assert!(h.engine.on_app_registered(APP));
    assert_eq!(
        h.engine.running_apps().get(APP).unwrap().status,
        LifeStatus::Running
    );
    assert!(!h.engine.on_app_registered("com.example.unknown"));
}

#[test]
fn test_relaunch_is_a_message() {
    let mut h = harness();
    let pid = running(&mut h);

    let (_, mut rx) = h.submit(LaunchRequest::new(APP).with_reason("notification"));
    assert!(rx.try_recv().is_err());

    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].request.method, "relaunch");
    assert_eq!(sent[0].request.destination, APP);
    assert_eq!(sent[0].request.payload["parameters"]["reason"], "notification");

    assert!(h.engine.on_external_reply(sent[0].token, json!({"returnValue": true})));
    let reply = rx.try_recv().unwrap();
    assert!(reply.return_value);
    assert_eq!(reply.pid, Some(pid));
    assert_eq!(h.processes.spawned().len(), 1);
}

#[test]
fn test_relaunch_rejected_by_app() {
    let mut h = harness();
    running(&mut h);

    let (_, mut rx) = h.submit(LaunchRequest::new(APP));
    let token = h.sent()[0].token;
    h.engine.on_external_reply(token, json!({"returnValue": false, "errorText": "busy"}));

    let reply = rx.try_recv().unwrap();
    assert!(!reply.return_value);
    assert!(reply.error_text.unwrap().contains("busy"));
    assert_eq!(
        h.engine.running_apps().get(APP).unwrap().status,
        LifeStatus::Running
    );
}

#[test]
fn test_relaunch_timeout_restores_running() {
    let mut h = harness();
    running(&mut h);

    let (_, mut rx) = h.submit(LaunchRequest::new(APP));
    assert_eq!(
        h.engine.running_apps().get(APP).unwrap().status,
        LifeStatus::Relaunching
    );
    h.events.clear();

    let deadline = h.engine.next_deadline().unwrap();
    assert_eq!(h.engine.expire_timeouts(deadline), 1);

    assert_eq!(
        rx.try_recv().unwrap().error_code,
        Some(ErrorCode::NotResponding.as_i32())
    );
    assert_eq!(
        h.engine.running_apps().get(APP).unwrap().status,
        LifeStatus::Running
    );
    assert_eq!(
        h.events.count(|e| matches!(
            e,
            LifecycleEvent::AppLifeStatusChanged {
                status: LifeStatus::Running,
                ..
            }
        )),
        1
    );
}

#[test]
fn test_close_acknowledged() {
    let mut h = harness();
    let pid = running(&mut h);

    let (_, mut rx) = h.submit(CloseRequest::new(APP, "com.example.shell").with_reason("user"));
    let sent = h.sent();
    assert_eq!(sent[0].request.method, "close");
    assert_eq!(sent[0].request.payload["reason"], "user");
    assert_eq!(
        h.engine.running_apps().get(APP).unwrap().status,
        LifeStatus::Closing
    );

    h.engine.on_external_reply(sent[0].token, json!({"returnValue": true}));
    assert!(rx.try_recv().unwrap().return_value);
    assert!(h.processes.signals().is_empty());

    // The client leaves the table once its process is reaped
    h.processes.exit(pid);
    assert_eq!(h.engine.reap_processes(), 1);
    assert!(h.engine.running_apps().is_empty());
}

#[test]
fn test_close_refused_forces_kill() {
    let mut h = harness();
    let pid = running(&mut h);

    let (_, mut rx) = h.submit(CloseRequest::new(APP, "shell"));
    let token = h.sent()[0].token;
    h.engine.on_external_reply(token, json!({"returnValue": false}));

    assert!(rx.try_recv().unwrap().return_value);
    assert_eq!(h.processes.signals(), vec![(pid, ProcessSignal::Kill)]);
    assert!(h.engine.running_apps().is_empty());
}

#[test]
fn test_close_not_responding_escalates() {
    let mut config = LifecycleConfig::for_testing().with_memory_admission(false);
    config.not_responding_timeout = Duration::from_millis(20);
    let mut h = HarnessBuilder::new()
        .app(AppDescriptor::new(APP, "/usr/bin/example", 2))
        .config(config)
        .build();
    let pid = running(&mut h);

    let (_, mut rx) = h.submit(CloseRequest::new(APP, "shell"));
    let token = h.sent()[0].token;
    let deadline = h.engine.next_deadline().unwrap();
    assert_eq!(h.engine.expire_timeouts(deadline), 1);

    let reply = rx.try_recv().unwrap();
    assert_eq!(reply.error_code, Some(ErrorCode::NotResponding.as_i32()));
    assert_eq!(h.processes.signals(), vec![(pid, ProcessSignal::Kill)]);
    assert!(h.engine.running_apps().is_empty());

    // The late acknowledgment is dropped
    assert!(!h.engine.on_external_reply(token, json!({"returnValue": true})));
}

#[test]
fn test_unregistered_close_kills_directly() {
    let mut h = harness();
    let (_, mut rx) = h.submit(LaunchRequest::new(APP));
    let pid = rx.try_recv().unwrap().pid.unwrap();

    let (_, mut rx) = h.submit(CloseRequest::new(APP, "shell"));
    assert!(rx.try_recv().unwrap().return_value);
    assert!(h.sent().is_empty());
    assert_eq!(h.processes.signals(), vec![(pid, ProcessSignal::Kill)]);
}

#[test]
fn test_pause_sends_without_waiting() {
    let mut h = harness();
    running(&mut h);

    let (_, mut rx) = h.submit(PauseRequest::new(APP));
    assert!(rx.try_recv().unwrap().return_value);
    let sent = h.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].request.method, "pause");
    assert_eq!(
        h.engine.running_apps().get(APP).unwrap().status,
        LifeStatus::Paused
    );
}

#[test]
fn test_transport_failure_fails_task() {
    let mut h = harness();
    running(&mut h);
    drop(std::mem::replace(&mut h.outbound, flume::unbounded().1));

    let (_, mut rx) = h.submit(CloseRequest::new(APP, "shell"));
    assert_eq!(
        rx.try_recv().unwrap().error_code,
        Some(ErrorCode::TransportFailed.as_i32())
    );
}
