//! Exponential backoff for busy-wait loops.

use std::thread;

/// Backoff that yields the processor a growing number of times per step.
///
/// Each [`snooze`](Self::snooze) yields `patience` times, then doubles
/// `patience` until it reaches [`MAX_PATIENCE`](Self::MAX_PATIENCE).
#[derive(Debug, Clone)]
pub struct YieldBackoff {
    patience: u32,
}

impl YieldBackoff {
    /// Upper bound on yields per step.
    pub const MAX_PATIENCE: u32 = 16;

    /// Starts at one yield per step.
    pub fn new() -> Self {
        Self { patience: 1 }
    }

    /// Perform one backoff step
    pub fn snooze(&mut self) {
        for _ in 0..self.patience {
            thread::yield_now();
        }
        if self.patience < Self::MAX_PATIENCE {
            self.patience <<= 1;
        }
    }

    /// Yields the next step will perform.
    pub fn patience(&self) -> u32 {
        self.patience
    }

    /// True once patience stopped growing.
    pub fn is_saturated(&self) -> bool {
        self.patience >= Self::MAX_PATIENCE
    }

    /// Back to one yield per step.
    pub fn reset(&mut self) {
        self.patience = 1;
    }
}

impl Default for YieldBackoff {
    fn default() -> Self {
        Self::new()
    }
}
