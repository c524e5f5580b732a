/*!
 * Core Module
 * Fundamental lifecycle types, limits, configuration, and error handling
 */

pub mod config;
pub mod errors;
pub mod id;
pub mod limits;
pub mod serde;
pub mod types;

// Re-export for convenience
pub use config::LifecycleConfig;
pub use errors::*;
pub use id::{AtomicGenerator, CorrelationToken, TaskUid};
pub use types::*;
