//! Counters shared by the thread pool and the timer executor.

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// One hour in microseconds.
const MAX_TRACKED_DELAY_US: u64 = 3_600_000_000;

/// Execution counters.
///
/// For the pool, `delay` is the time a task spent queued. For the timer
/// executor it is how late a timer fired relative to its deadline.
#[derive(Debug)]
pub struct ExecutorStats {
    submitted: AtomicU64,
    executed: AtomicU64,
    panicked: AtomicU64,
    discarded: AtomicU64,
    delay_histogram: Option<Mutex<Histogram<u64>>>,
    start_time: Instant,
}

impl ExecutorStats {
    /// Zeroed counters. The histogram is skipped if it cannot be allocated.
    pub fn new() -> Self {
        let histogram = match Histogram::new_with_max(MAX_TRACKED_DELAY_US, 3) {
            Ok(h) => Some(Mutex::new(h)),
            Err(e) => {
                tracing::warn!("delay histogram disabled: {}", e);
                None
            }
        };

        Self {
            submitted: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            delay_histogram: histogram,
            start_time: Instant::now(),
        }
    }

    /// Counts an accepted callable.
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a run and records its delay. A contended histogram skips the sample.
    pub fn record_executed(&self, delay: Duration) {
        self.executed.fetch_add(1, Ordering::Relaxed);

        if let Some(hist) = &self.delay_histogram {
            let us = (delay.as_micros() as u64).min(MAX_TRACKED_DELAY_US);
            if let Some(mut hist) = hist.try_lock() {
                let _ = hist.record(us);
            }
        }
    }

    /// Counts a panic.
    pub fn record_panic(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts tasks dropped from a queue.
    pub fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    /// Copies the counters and summarizes the delay histogram.
    pub fn snapshot(&self) -> StatsSnapshot {
        let (avg, p99, max) = match &self.delay_histogram {
            Some(hist) => {
                let hist = hist.lock();
                if hist.len() == 0 {
                    (0, 0, 0)
                } else {
                    (
                        hist.mean() as u64,
                        hist.value_at_quantile(0.99),
                        hist.max(),
                    )
                }
            }
            None => (0, 0, 0),
        };

        StatsSnapshot {
            uptime: self.start_time.elapsed(),
            submitted: self.submitted.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            avg_delay_us: avg,
            p99_delay_us: p99,
            max_delay_us: max,
        }
    }
}

impl Default for ExecutorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ExecutorStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Time since the executor was created.
    pub uptime: Duration,
    /// Callables accepted.
    pub submitted: u64,
    /// Callables run, including the ones that panicked.
    pub executed: u64,
    /// Callables that panicked.
    pub panicked: u64,
    /// Queued tasks dropped without running.
    pub discarded: u64,
    /// Mean delay in microseconds.
    pub avg_delay_us: u64,
    /// 99th percentile delay in microseconds.
    pub p99_delay_us: u64,
    /// Largest recorded delay in microseconds.
    pub max_delay_us: u64,
}
