/*!
 * Task Module
 * Lifecycle tasks, reply obligations, and the in-flight task registry
 */

pub mod registry;
pub mod reply;
pub mod types;

pub use registry::LifecycleTaskRegistry;
pub use reply::ReplyObligation;
pub use types::{
    CloseDetails, CloseRequest, LaunchDetails, LaunchRequest, PauseDetails, PauseRequest, Task,
    TaskError, TaskKind, TaskKindTag, TaskOutcome, TaskReply, TaskRequest, TaskSnapshot,
    TaskState,
};
