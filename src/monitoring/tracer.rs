/*!
 * Structured Tracing
 * Subscriber setup and per-task spans using the tracing crate
 *
 * Features:
 * - Trace id per task for correlating every log line of one request
 * - JSON-formatted logs for structured parsing
 * - Task spans that live across suspensions and report total duration
 */

use crate::core::id::TaskUid;
use crate::core::limits::SLOW_TASK_THRESHOLD;
use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - LIFECYCLE_TRACE_JSON: Enable JSON output (default: false)
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("LIFECYCLE_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .init();
        info!("Structured tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .init();
        info!("Structured tracing initialized");
    }
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one task from submit to finish
///
/// The span outlives any single call into the engine: it is entered each
/// time the task's stages run and closed when the task is finalized.
pub struct TaskSpan {
    span: tracing::Span,
    start: Instant,
    uid: TaskUid,
    trace_id: String,
}

impl TaskSpan {
    pub fn new(uid: TaskUid, app_id: &str, kind: &'static str) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "task",
            trace_id = %trace_id,
            uid = %uid,
            app_id = app_id,
            kind = kind,
            stage = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let _entered = span.enter();
        debug!(uid = %uid, app_id, kind, "task submitted");
        drop(_entered);

        Self {
            span,
            start: Instant::now(),
            uid,
            trace_id,
        }
    }

    /// Get the trace ID for this task
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Handle to the underlying span, for entering it across calls
    pub fn span(&self) -> tracing::Span {
        self.span.clone()
    }

    /// Record the stage the task is about to run
    pub fn record_stage(&self, stage: &str) {
        self.span.record("stage", stage);
    }

    /// Record the terminal outcome
    pub fn record_outcome(&self, success: bool) {
        self.span
            .record("outcome", if success { "success" } else { "error" });
    }
}

impl Drop for TaskSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();

        if duration > SLOW_TASK_THRESHOLD {
            warn!(
                trace_id = %self.trace_id,
                uid = %self.uid,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow task detected"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                uid = %self.uid,
                duration_us = duration.as_micros() as u64,
                "task closed"
            );
        }
    }
}
