/*!
 * Memory Module
 * Serialized memory-reclamation admission control
 */

pub mod queue;
pub mod traits;
pub mod types;

pub use queue::MemoryAdmissionQueue;
pub use traits::*;
pub use types::*;
