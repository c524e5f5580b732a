/*!
 * Apps Module
 * Application descriptor lookup and execution locks
 */

pub mod directory;
pub mod locks;
pub mod traits;
pub mod types;

pub use directory::StaticAppDirectory;
pub use locks::ExecutionLocks;
pub use traits::AppDirectory;
pub use types::AppDescriptor;
