/*!
 * Observability
 * Structured tracing and lifecycle event fan-out
 */

pub mod bus;
pub mod events;
pub mod tracer;

pub use bus::{BusStats, EventBus, ObserverFn, Subscription};
pub use events::{LifecycleEvent, Topic};
pub use tracer::{generate_trace_id, init_tracing, TaskSpan};
