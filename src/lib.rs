/*!
 * App Lifecycle Kernel Library
 * Launch, close, and pause orchestration for native applications
 */

pub mod apps;
pub mod core;
pub mod gate;
pub mod ipc;
pub mod memory;
pub mod monitoring;
pub mod pipeline;
pub mod protocol;
pub mod service;
pub mod task;

// Re-exports
pub use apps::{AppDescriptor, AppDirectory, ExecutionLocks, StaticAppDirectory};
pub use crate::core::{
    ErrorClass, ErrorCode, LifecycleConfig, LifecycleError, LifecycleResult, RegistryError,
};
pub use crate::core::{CorrelationToken, TaskUid};
pub use gate::{CheckReporter, CheckStatus, FnCheck, GateResult, PrerequisiteCheck, PrerequisiteGate};
pub use ipc::{ChannelTransport, Envelope, OutboundRequest, Transport};
pub use memory::{DeferredReclaim, MemoryAdmissionQueue, NoopReclaim, ReclaimOutcome, ReclaimPolicy};
pub use monitoring::{init_tracing, EventBus, LifecycleEvent, Subscription, Topic};
pub use pipeline::{
    Dispatch, Stage, StageChain, StageReply, StagePipelineEngine, StandardChains, Verdict,
};
pub use protocol::{
    protocol_for, LifeStatus, NativeLifecycleProtocol, OsProcessController, ProcessController,
    ProtocolVersion,
};
pub use service::LifecycleService;
pub use task::{
    CloseRequest, LaunchRequest, LifecycleTaskRegistry, PauseRequest, ReplyObligation, TaskReply,
    TaskRequest,
};
