/*!
 * Native Lifecycle Protocol
 * Versioned adapters for commanding native processes
 */

pub mod common;
pub mod process;
pub mod running;
pub mod traits;
pub mod types;
pub mod v1;
pub mod v2;
pub mod v3;

pub use process::{OsProcessController, ProcessController};
pub use running::RunningApps;
pub use traits::{NativeContext, NativeLifecycleProtocol};
pub use types::{
    LaunchArguments, LifeStatus, NativeClient, NativeStep, ProcessSignal, ProtocolVersion,
};
pub use v1::NativeV1;
pub use v2::NativeV2;
pub use v3::NativeV3;

static V1: NativeV1 = NativeV1;
static V2: NativeV2 = NativeV2;
static V3: NativeV3 = NativeV3;

/// Dispatch table from protocol version to adapter
pub fn protocol_for(version: ProtocolVersion) -> &'static dyn NativeLifecycleProtocol {
    match version {
        ProtocolVersion::V1 => &V1,
        ProtocolVersion::V2 => &V2,
        ProtocolVersion::V3 => &V3,
    }
}
