/*!
 * Core Types
 * Common types used across the lifecycle kernel
 */

use std::time::{SystemTime, UNIX_EPOCH};

/// Application identifier (reverse-domain string, e.g. `com.example.app`)
pub type AppId = String;

/// OS process id of a native application
pub type Pid = u32;

/// Display the launch is targeted at
pub type DisplayId = u32;

/// Timestamp in microseconds since the UNIX epoch
pub type Timestamp = u64;

/// Current wall-clock time as a [`Timestamp`]
#[inline]
pub fn now_micros() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
