/*!
 * Lifecycle Limits and Constants
 *
 * Centralized location for lifecycle-wide limits, thresholds, and timeouts.
 * Grouped by subsystem.
 */

use std::time::Duration;

// =============================================================================
// PIPELINE
// =============================================================================

/// Maximum number of redirects a single task may follow.
/// The redirect after this many fails the task with `RedirectLoop`.
pub const MAX_REDIRECTS: u32 = 4;

/// Default deadline for a suspended stage when neither the dispatch nor the
/// stage configures one
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// NATIVE PROTOCOL
// =============================================================================

/// How long a V2 native app may take to acknowledge a close request before it
/// is treated as not responding and escalated to forced termination
pub const NOT_RESPONDING_TIMEOUT: Duration = Duration::from_secs(10);

/// Declared interface version for the legacy signal-driven protocol
pub const NATIVE_INTERFACE_V1: i32 = 1;

/// Declared interface version for the message-driven protocol
pub const NATIVE_INTERFACE_V2: i32 = 2;

/// Declared interface version reserved for the next protocol generation
pub const NATIVE_INTERFACE_V3: i32 = 3;

// =============================================================================
// REGISTRY
// =============================================================================

/// Number of finalized task uids remembered so a duplicate reply can be
/// reported as such rather than as an unknown task
pub const FINALIZED_HISTORY: usize = 4096;

// =============================================================================
// SERVICE
// =============================================================================

/// How often the service loop reaps exited native processes
pub const REAP_INTERVAL: Duration = Duration::from_millis(500);

/// Floor applied to a configured reap interval
pub const MIN_REAP_INTERVAL: Duration = Duration::from_millis(10);

// =============================================================================
// MONITORING
// =============================================================================

/// Tasks taking longer than this from submit to finish are logged as slow
pub const SLOW_TASK_THRESHOLD: Duration = Duration::from_secs(5);
