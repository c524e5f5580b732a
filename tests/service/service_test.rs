/*!
 * Lifecycle Service Tests
 * The engine driven from its tokio task
 */

use crate::common::*;
use app_lifecycle::gate::{FnCheck, GateResult, PrerequisiteGate};
use app_lifecycle::{
    AppDescriptor, ChannelTransport, CloseRequest, ErrorCode, LaunchRequest, LifecycleConfig,
    LifecycleService, StagePipelineEngine, StandardChains, StaticAppDirectory,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn service(
    config: LifecycleConfig,
) -> (LifecycleService, FakeProcesses, flume::Receiver<app_lifecycle::Envelope>) {
    let processes = FakeProcesses::new();
    let (transport, outbound) = ChannelTransport::new();
    let chains = StandardChains::new(&config).unwrap();
    let engine = StagePipelineEngine::builder()
        .with_config(config)
        .with_apps(Arc::new(StaticAppDirectory::from_descriptors([
            AppDescriptor::new(APP, "/usr/bin/example", 2),
        ])))
        .with_transport(transport)
        .with_process_controller(processes.clone())
        .gated()
        .build();
    (LifecycleService::spawn(engine, chains), processes, outbound)
}

fn passing_gate() -> PrerequisiteGate {
    let mut gate = PrerequisiteGate::new(|_| {});
    gate.register(FnCheck::predicate("ready", || true)).unwrap();
    gate
}

#[tokio::test]
async fn test_tasks_wait_for_bootstrap() {
    let (service, _, _) = service(LifecycleConfig::for_testing());

    let mut rx = service.submit(LaunchRequest::new(APP)).unwrap();
    let queued = service.snapshot().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert!(rx.try_recv().is_err());

    assert_eq!(service.bootstrap(passing_gate()).await.unwrap(), GateResult::Passed);
    let reply = rx.await.unwrap();
    assert!(reply.return_value);

    let (engine, cancelled) = service.shutdown().await.unwrap();
    assert_eq!(cancelled, 0);
    assert_eq!(engine.running_apps().len(), 1);
}

#[tokio::test]
async fn test_failed_gate_keeps_engine_closed() {
    let (service, processes, _) = service(LifecycleConfig::for_testing());
    let mut gate = PrerequisiteGate::new(|_| {});
    gate.register(FnCheck::predicate("manifest", || false)).unwrap();

    let rx = service.submit(LaunchRequest::new(APP)).unwrap();
    assert_eq!(service.bootstrap(gate).await.unwrap(), GateResult::Failed);

    let (_, cancelled) = service.shutdown().await.unwrap();
    assert_eq!(cancelled, 1);
    let reply = rx.await.unwrap();
    assert_eq!(reply.error_code, Some(ErrorCode::Cancelled.as_i32()));
    assert!(processes.spawned().is_empty());
}

#[tokio::test]
async fn test_external_reply_round_trip() {
    let (service, _, outbound) = service(LifecycleConfig::for_testing().with_memory_admission(false));
    service.bootstrap(passing_gate()).await.unwrap();

    service.submit(LaunchRequest::new(APP)).unwrap().await.unwrap();
    service.app_registered(APP).unwrap();

    let rx = service.submit(CloseRequest::new(APP, "shell")).unwrap();
    let envelope = outbound.recv_async().await.unwrap();
    assert_eq!(envelope.request.method, "close");
    service
        .external_reply(envelope.token, json!({"returnValue": true}))
        .unwrap();

    assert!(rx.await.unwrap().return_value);
    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deadline_fires_from_service_loop() {
    let mut config = LifecycleConfig::for_testing().with_memory_admission(false);
    config.not_responding_timeout = Duration::from_millis(30);
    let (service, processes, outbound) = service(config);
    service.set_ready(true).unwrap();

    service.submit(LaunchRequest::new(APP)).unwrap().await.unwrap();
    service.app_registered(APP).unwrap();

    let rx = service.submit(CloseRequest::new(APP, "shell")).unwrap();
    let _unanswered = outbound.recv_async().await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("deadline fired")
        .unwrap();
    assert_eq!(reply.error_code, Some(ErrorCode::NotResponding.as_i32()));
    assert_eq!(processes.signals().len(), 1);
    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancel_through_service() {
    let (service, _, _) = service(LifecycleConfig::for_testing());

    let rx = service.submit(LaunchRequest::new(APP)).unwrap();
    let uid = service.snapshot().await.unwrap()[0].uid;
    assert!(service.cancel(uid).await.unwrap());
    assert!(!service.cancel(uid).await.unwrap());
    assert_eq!(
        rx.await.unwrap().error_code,
        Some(ErrorCode::Cancelled.as_i32())
    );
    assert_eq!(service.cancel_all().await.unwrap(), 0);
}

#[tokio::test]
async fn test_zero_reap_interval_is_clamped() {
    let mut config = LifecycleConfig::for_testing();
    config.reap_interval = Duration::ZERO;
    let (service, processes, _) = service(config);
    service.set_ready(true).unwrap();

    let reply = service.submit(LaunchRequest::new(APP)).unwrap().await.unwrap();
    assert!(reply.return_value);
    assert_eq!(processes.spawned().len(), 1);

    let (engine, _) = service.shutdown().await.unwrap();
    assert_eq!(engine.running_apps().len(), 1);
}
