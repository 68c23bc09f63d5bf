//! Deadline-ordered timer execution.
//!
//! [`TimerExecutor`] fires one-shot and repeating callables from a min-heap
//! using a small pool of worker threads. [`Timer`] binds one logical timer to
//! an executor handed in by the caller.

/// Cancellation flag shared between a callback and its owner.
pub mod cancel;
pub(crate) mod entry;
/// Heap-backed dispatcher.
pub mod executor;
/// Restartable single-timer handle.
pub mod handle;

use std::fmt;

pub use cancel::CancelToken;
pub use executor::TimerExecutor;
pub use handle::Timer;

/// Opaque identifier of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u64);

impl TimerId {
    /// Raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}
