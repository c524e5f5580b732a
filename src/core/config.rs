/*!
 * Lifecycle Configuration
 *
 * Runtime knobs for the pipeline, the native protocols, and the service,
 * with presets and environment overrides.
 */

use crate::core::limits::*;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Lifecycle kernel configuration
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Redirects a task may follow before failing (default: 4)
    pub max_redirects: u32,

    /// Deadline for suspended stages with no explicit timeout (default: 30s).
    /// `None` lets a stage wait until it is cancelled.
    pub default_stage_timeout: Option<Duration>,

    /// Close acknowledgment deadline for V2 native apps (default: 10s)
    pub not_responding_timeout: Duration,

    /// Route launches and memory-reclaim closes through the admission queue
    pub memory_admission: bool,

    /// Finalized uids remembered for duplicate-reply detection
    pub finalized_history: usize,

    /// Abort startup when a prerequisite check fails
    pub strict_boot: bool,

    /// JSON manifest of app descriptors (binary only)
    pub apps_path: Option<PathBuf>,

    /// Interval between native process reaps
    pub reap_interval: Duration,
}

impl LifecycleConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self {
            max_redirects: MAX_REDIRECTS,
            default_stage_timeout: Some(DEFAULT_STAGE_TIMEOUT),
            not_responding_timeout: NOT_RESPONDING_TIMEOUT,
            memory_admission: true,
            finalized_history: FINALIZED_HISTORY,
            strict_boot: false,
            apps_path: None,
            reap_interval: REAP_INTERVAL,
        }
    }

    /// Defaults without an implicit stage deadline (testing only)
    pub fn for_testing() -> Self {
        Self {
            default_stage_timeout: None,
            ..Self::new()
        }
    }

    /// Defaults overridden from `LIFECYCLE_*` environment variables
    ///
    /// Environment variables:
    /// - LIFECYCLE_MAX_REDIRECTS
    /// - LIFECYCLE_STAGE_TIMEOUT_MS (0 disables the default deadline)
    /// - LIFECYCLE_NOT_RESPONDING_MS
    /// - LIFECYCLE_MEMORY_ADMISSION (true/false)
    /// - LIFECYCLE_STRICT_BOOT (true/false)
    /// - LIFECYCLE_APPS_PATH
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(v) = parse_var::<u32, _>(&lookup, "LIFECYCLE_MAX_REDIRECTS") {
            config.max_redirects = v;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "LIFECYCLE_STAGE_TIMEOUT_MS") {
            config.default_stage_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "LIFECYCLE_NOT_RESPONDING_MS") {
            config.not_responding_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = parse_var::<bool, _>(&lookup, "LIFECYCLE_MEMORY_ADMISSION") {
            config.memory_admission = v;
        }
        if let Some(v) = parse_var::<bool, _>(&lookup, "LIFECYCLE_STRICT_BOOT") {
            config.strict_boot = v;
        }
        if let Some(path) = lookup("LIFECYCLE_APPS_PATH") {
            config.apps_path = Some(PathBuf::from(path));
        }

        config
    }

    #[inline]
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_stage_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_memory_admission(mut self, enabled: bool) -> Self {
        self.memory_admission = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = max;
        self
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring invalid configuration value");
            None
        }
    }
}
