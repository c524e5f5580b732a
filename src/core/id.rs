/*!
 * ID Types
 * Type-safe task and correlation identifiers plus a monotonic generator
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ============================================================================
// Type-Safe ID Wrappers
// ============================================================================

/// Unique id of an in-flight lifecycle task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskUid(pub u64);

impl From<u64> for TaskUid {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TaskUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Binds an outstanding asynchronous request to the task awaiting its reply.
///
/// Tokens handed out by the transport and tokens minted locally by the engine
/// (admission waits) live in separate namespaces so they can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "source", content = "id", rename_all = "snake_case")]
pub enum CorrelationToken {
    Transport(u64),
    Local(u64),
}

impl CorrelationToken {
    #[inline]
    pub fn is_local(&self) -> bool {
        matches!(self, CorrelationToken::Local(_))
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationToken::Transport(id) => write!(f, "t:{}", id),
            CorrelationToken::Local(id) => write!(f, "l:{}", id),
        }
    }
}

// ============================================================================
// Atomic Counter Generator
// ============================================================================

/// Monotonic id generator
///
/// Clones share the same counter, so a generator can be handed to several
/// owners without ever producing a duplicate.
pub struct AtomicGenerator<T> {
    counter: Arc<AtomicU64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: From<u64>> AtomicGenerator<T> {
    /// Create new generator starting at given value
    #[inline]
    pub fn new(start: u64) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(start)),
            _marker: PhantomData,
        }
    }

    /// Allocate the next id
    #[inline]
    pub fn next(&self) -> T {
        T::from(self.counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Value the next call to `next` will return
    #[inline]
    pub fn peek(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl<T: From<u64>> Default for AtomicGenerator<T> {
    fn default() -> Self {
        Self::new(1)
    }
}

impl<T> Clone for AtomicGenerator<T> {
    fn clone(&self) -> Self {
        Self {
            counter: Arc::clone(&self.counter),
            _marker: PhantomData,
        }
    }
}
