/*!
 * Protocol Version Tests
 * Declared interface versions select adapters; unknown versions fail cleanly
 */

use crate::common::*;
use app_lifecycle::protocol::{protocol_for, ProtocolVersion};
use app_lifecycle::{AppDescriptor, ErrorCode, LaunchRequest};

#[test]
fn test_dispatch_table() {
    for version in [ProtocolVersion::V1, ProtocolVersion::V2, ProtocolVersion::V3] {
        assert_eq!(protocol_for(version).version(), version);
    }
}

#[test]
fn test_declared_versions() {
    assert_eq!(
        ProtocolVersion::from_declared("a", 2).unwrap(),
        ProtocolVersion::V2
    );
    assert!(ProtocolVersion::from_declared("a", 0).is_err());
    assert!(ProtocolVersion::from_declared("a", 4).is_err());
}

#[test]
fn test_reserved_and_unknown_versions_fail_launch() {
    for declared in [3, 9] {
        let mut h = HarnessBuilder::new()
            .app(AppDescriptor::new(APP, "/usr/bin/example", declared))
            .build();

        let (_, mut rx) = h.submit(LaunchRequest::new(APP));
        let reply = rx.try_recv().unwrap();
        assert_eq!(
            reply.error_code,
            Some(ErrorCode::UnsupportedProtocol.as_i32()),
            "declared version {}",
            declared
        );
        assert!(h.processes.spawned().is_empty());
    }
}
