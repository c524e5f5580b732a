/*!
 * Service Module
 * Event-loop driver around the pipeline engine
 */

pub mod driver;

pub use driver::{LifecycleService, ServiceCommand};
