/*!
 * Prerequisite Gate
 * Startup readiness gating over independently resolving checks
 */

pub mod check;
#[allow(clippy::module_inception)]
pub mod gate;
pub mod types;

pub use check::{CheckReporter, FnCheck, PrerequisiteCheck};
pub use gate::{GateCallback, PrerequisiteGate};
pub use types::{CheckStatus, GateResult, StatusUpdate};
