/*!
 * Redirect Tests
 * Redirect chains resolve to their final target; loops are bounded
 */

use crate::common::*;
use app_lifecycle::core::limits::MAX_REDIRECTS;
use app_lifecycle::{AppDescriptor, ErrorCode, LaunchRequest, LifecycleConfig};
use proptest::prelude::*;

fn hop(i: u32) -> String {
    format!("com.example.hop{}", i)
}

/// `hops` redirects ending at a launchable app
fn redirect_chain(hops: u32, max: u32) -> Harness {
    let mut builder = HarnessBuilder::new().config(
        LifecycleConfig::for_testing()
            .with_memory_admission(false)
            .with_max_redirects(max),
    );
    for i in 0..hops {
        builder = builder.app(AppDescriptor::new(hop(i), "/usr/bin/hop", 1).redirect_to(hop(i + 1)));
    }
    builder.app(AppDescriptor::new(hop(hops), "/usr/bin/final", 1)).build()
}

#[test]
fn test_redirect_reaches_final_target() {
    let mut h = redirect_chain(2, MAX_REDIRECTS);

    let (_, mut rx) = h.submit(LaunchRequest::new(hop(0)));
    let reply = rx.try_recv().unwrap();
    assert!(reply.return_value);
    assert_eq!(reply.app_id, hop(2));
    assert_eq!(h.processes.spawned()[0].0, hop(2));
}

#[test]
fn test_redirect_cycle_fails() {
    let mut h = HarnessBuilder::new()
        .app(AppDescriptor::new("com.example.a", "/usr/bin/a", 1).redirect_to("com.example.b"))
        .app(AppDescriptor::new("com.example.b", "/usr/bin/b", 1).redirect_to("com.example.a"))
        .build();

    let (_, mut rx) = h.submit(LaunchRequest::new("com.example.a"));
    let reply = rx.try_recv().unwrap();
    assert_eq!(reply.error_code, Some(ErrorCode::RedirectLoop.as_i32()));
    assert!(h.processes.spawned().is_empty());
}

#[test]
fn test_self_redirect_is_ignored() {
    let mut h = HarnessBuilder::new()
        .app(AppDescriptor::new(APP, "/usr/bin/example", 1).redirect_to(APP))
        .build();

    let (_, mut rx) = h.submit(LaunchRequest::new(APP));
    assert!(rx.try_recv().unwrap().return_value);
}

proptest! {
    #[test]
    fn prop_redirects_bounded(hops in 0u32..10, max in 0u32..6) {
        let mut h = redirect_chain(hops, max);

        let (_, mut rx) = h.submit(LaunchRequest::new(hop(0)));
        let reply = rx.try_recv().unwrap();

        if hops <= max {
            prop_assert!(reply.return_value);
            prop_assert_eq!(reply.app_id, hop(hops));
        } else {
            prop_assert_eq!(reply.error_code, Some(ErrorCode::RedirectLoop.as_i32()));
            prop_assert!(h.processes.spawned().is_empty());
        }
        prop_assert_eq!(h.engine.in_flight(), 0);
    }
}
