/*!
 * Stage Pipeline
 * Data-driven stage chains and the engine that executes them
 */

pub mod context;
pub mod engine;
pub mod stage;
pub mod stages;

pub use context::StageContext;
pub use engine::{StagePipelineEngine, StagePipelineEngineBuilder};
pub use stage::{Dispatch, Stage, StageChain, StageKind, StageReply, Verdict};
pub use stages::StandardChains;
