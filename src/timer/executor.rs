use super::entry::{HeapSlot, TimerEntry};
use super::TimerId;
use crate::config::TimerConfig;
use crate::error::{Error, Result};
use crate::executor::worker::WorkerSet;
use crate::executor::PanicHandler;
use crate::stats::{ExecutorStats, StatsSnapshot};
use parking_lot::{Condvar, Mutex};
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const US_PER_MS: u64 = 1_000;

#[derive(Debug, Default)]
struct TimerState {
    // May hold stale slots of canceled entries; they are dropped when they
    // reach the top.
    heap: BinaryHeap<HeapSlot>,
    // Live timers. An id missing here never fires again.
    index: HashMap<TimerId, Arc<TimerEntry>>,
    active: bool,
    // Bumped on every start so workers from an earlier run always exit.
    generation: u64,
}

struct TimerShared {
    state: Mutex<TimerState>,
    condvar: Condvar,
    epoch: Instant,
    next_id: AtomicU64,
    panic_handler: PanicHandler,
    stats: ExecutorStats,
}

impl TimerShared {
    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    /// Blocks until a slot is due and claims it, or returns `None` when this
    /// worker's run is over.
    fn next_due(&self, generation: u64) -> Option<HeapSlot> {
        let mut state = self.state.lock();
        loop {
            if !state.active || state.generation != generation {
                return None;
            }

            while state
                .heap
                .peek()
                .map_or(false, |slot| slot.entry.is_stopped())
            {
                state.heap.pop();
            }

            let next_run_us = match state.heap.peek().map(|slot| slot.next_run_us) {
                Some(next_run_us) => next_run_us,
                None => {
                    self.condvar.wait(&mut state);
                    continue;
                }
            };

            let now = self.now_us();
            if now >= next_run_us {
                // Popped under the lock: exactly one worker claims the slot.
                if let Some(slot) = state.heap.pop() {
                    return Some(slot);
                }
                continue;
            }

            // Woken early by a new timer, a cancel or stop; re-evaluate.
            self.condvar
                .wait_for(&mut state, Duration::from_micros(next_run_us - now));
        }
    }

    fn fire(&self, slot: HeapSlot) {
        let HeapSlot { next_run_us, entry } = slot;

        // Canceled after the claim but before we got here.
        if entry.is_stopped() {
            return;
        }

        let lateness = Duration::from_micros(self.now_us().saturating_sub(next_run_us));
        let outcome = self.panic_handler.execute(entry.id, || entry.invoke());
        self.stats.record_executed(lateness);
        if outcome.is_err() {
            self.stats.record_panic();
        }

        let mut state = self.state.lock();
        let interval_us = entry.interval_us();
        if interval_us > 0 {
            if !entry.is_stopped() {
                let next_run_us = self.now_us().saturating_add(interval_us);
                state.heap.push(HeapSlot { next_run_us, entry });
            }
        } else {
            let current = state
                .index
                .get(&entry.id)
                .map_or(false, |live| Arc::ptr_eq(live, &entry));
            if current {
                state.index.remove(&entry.id);
            }
        }
    }
}

fn run_worker(shared: Arc<TimerShared>, generation: u64, id: usize) {
    tracing::debug!(worker = id, generation, "timer worker started");
    while let Some(slot) = shared.next_due(generation) {
        shared.fire(slot);
    }
    tracing::debug!(worker = id, generation, "timer worker exiting");
}

/// Fires one-shot and repeating callables at millisecond deadlines
/// (tracked with microsecond precision).
///
/// Timers never fire early. Under load they may fire late, and a repeating
/// timer's next deadline is computed from the moment its callable returned,
/// so overload lowers the fire rate instead of producing catch-up bursts.
/// Callable panics are logged and counted; nobody waits on a timer's result.
pub struct TimerExecutor {
    shared: Arc<TimerShared>,
    workers: WorkerSet,
    config: TimerConfig,
}

impl TimerExecutor {
    /// Validates `config` and starts the dispatch threads.
    pub fn new(config: TimerConfig) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState::default()),
            condvar: Condvar::new(),
            epoch: Instant::now(),
            next_id: AtomicU64::new(1),
            panic_handler: PanicHandler::new(config.panic_strategy),
            stats: ExecutorStats::new(),
        });

        let executor = Self {
            shared,
            workers: WorkerSet::new(),
            config,
        };
        executor.start()?;
        Ok(executor)
    }

    /// Executor with `threads` workers and default settings otherwise.
    pub fn with_threads(threads: usize) -> Result<Self> {
        Self::new(TimerConfig::builder().num_threads(threads).build()?)
    }

    /// Runs `f` once, `delay_ms` from now.
    pub fn schedule_once<F>(&self, delay_ms: u64, f: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let cell = Mutex::new(Some(f));
        self.schedule(delay_ms, 0, move || {
            if let Some(f) = cell.lock().take() {
                f();
            }
        })
    }

    /// Runs `f` every `interval_ms`, first after `interval_ms`. Each next
    /// deadline is measured from when the previous run finished. A zero
    /// interval is treated as 1 ms.
    pub fn schedule_repeating<F>(&self, interval_ms: u64, f: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let interval_ms = interval_ms.max(1);
        self.schedule(interval_ms, interval_ms, f)
    }

    fn schedule<F>(&self, delay_ms: u64, interval_ms: u64, f: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = TimerId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(TimerEntry::new(
            id,
            interval_ms.saturating_mul(US_PER_MS),
            Box::new(f),
        ));
        let next_run_us = self
            .shared
            .now_us()
            .saturating_add(delay_ms.saturating_mul(US_PER_MS));

        {
            let mut state = self.shared.state.lock();
            state.index.insert(id, entry.clone());
            state.heap.push(HeapSlot { next_run_us, entry });
        }
        self.shared.stats.record_submitted();
        self.shared.condvar.notify_one();

        tracing::debug!(timer = %id, delay_ms, interval_ms, "timer scheduled");
        id
    }

    /// Cancels a timer. Unknown or already finished ids are ignored; the
    /// return value tells whether a live timer was removed.
    pub fn cancel(&self, id: TimerId) -> bool {
        let removed = {
            let mut state = self.shared.state.lock();
            let removed = state.index.remove(&id);
            if let Some(entry) = &removed {
                entry.stop();
            }
            removed
        };
        self.shared.condvar.notify_one();

        match removed {
            Some(_) => {
                self.shared.stats.record_discarded(1);
                tracing::debug!(timer = %id, "timer canceled");
                true
            }
            None => false,
        }
    }

    /// Changes the cadence of a repeating timer, effective from its next
    /// computed deadline. Ignored for unknown ids, one-shot timers and a zero
    /// interval.
    pub fn set_interval(&self, id: TimerId, interval_ms: u64) -> bool {
        if interval_ms == 0 {
            return false;
        }

        let updated = {
            let state = self.shared.state.lock();
            match state.index.get(&id) {
                Some(entry) if entry.is_repeating() => {
                    entry.set_interval_us(interval_ms.saturating_mul(US_PER_MS));
                    true
                }
                _ => false,
            }
        };
        if updated {
            tracing::debug!(timer = %id, interval_ms, "timer interval changed");
        }
        updated
    }

    /// True while `id` may still fire.
    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.shared.state.lock().index.contains_key(&id)
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.shared.state.lock().index.len()
    }

    /// True when no timer is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// False between [`stop`](Self::stop) and the next [`start`](Self::start).
    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active
    }

    /// Spawns the workers if the executor is stopped. Scheduled timers that
    /// came due while stopped fire right away.
    ///
    /// From inside a callback this fails while another thread is in the
    /// middle of [`stop`](Self::stop).
    pub fn start(&self) -> Result<()> {
        let Some(mut workers) = self.workers.acquire() else {
            return Err(Error::executor("timer executor is being stopped"));
        };
        let generation = {
            let mut state = self.shared.state.lock();
            if state.active {
                return Ok(());
            }
            state.active = true;
            state.generation += 1;
            state.generation
        };

        for id in 0..self.config.num_threads {
            let name = format!("{}-{}", self.config.thread_name_prefix, id);
            let mut builder = thread::Builder::new().name(name);
            if let Some(stack_size) = self.config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let shared = self.shared.clone();
            let handle = builder
                .spawn(move || run_worker(shared, generation, id))
                .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;
            self.workers.add(&mut workers, handle);
        }

        tracing::info!(
            threads = self.config.num_threads,
            generation,
            "timer executor started"
        );
        Ok(())
    }

    /// Stops and joins the workers. Scheduled timers are kept and resume on
    /// the next [`start`](Self::start). A callable running at the time
    /// finishes first, and concurrent calls all wait for the join.
    ///
    /// Called from a callback, the calling worker is left to exit on its own
    /// and is joined by the next `stop` (or the drop) from another thread.
    pub fn stop(&self) {
        // Held across the join so a concurrent `start` or `stop` waits.
        let Some(mut workers) = self.workers.acquire() else {
            self.deactivate();
            return;
        };
        let was_active = self.deactivate();
        self.workers.join_all(&mut workers, "timer");
        if was_active {
            tracing::info!("timer executor stopped");
        }
    }

    fn deactivate(&self) -> bool {
        let was_active = std::mem::replace(&mut self.shared.state.lock().active, false);
        self.shared.condvar.notify_all();
        was_active
    }

    /// Configured dispatch thread count.
    pub fn num_threads(&self) -> usize {
        self.config.num_threads
    }

    /// Fire lateness and callback counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl Drop for TimerExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for TimerExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerExecutor")
            .field("num_threads", &self.config.num_threads)
            .field("timers", &self.len())
            .field("active", &self.is_active())
            .finish()
    }
}
