use super::{CancelToken, TimerExecutor, TimerId};
use crate::util::DeferStack;
use std::fmt;
use std::sync::Arc;

type SharedCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// One logical timer bound to a caller-supplied [`TimerExecutor`].
///
/// `start` arms the timer once; further `start`/`restart` calls are ignored
/// until it stops, either explicitly or, for a one-shot timer, when its
/// callback returns. A one-shot timer counts as running while its callback
/// executes.
/// Each arm gets its own [`CancelToken`], so a callback already dispatched by
/// the executor cannot start after `stop`, nor fire on behalf of a later arm.
pub struct Timer {
    executor: Arc<TimerExecutor>,
    id: Option<TimerId>,
    repeat: bool,
    interval_ms: u64,
    callback: Option<SharedCallback>,
    token: CancelToken,
}

impl Timer {
    /// Idle timer bound to `executor`. Nothing is scheduled until
    /// [`start`](Self::start).
    pub fn new(executor: Arc<TimerExecutor>, repeat: bool) -> Self {
        Self {
            executor,
            id: None,
            repeat,
            interval_ms: 0,
            callback: None,
            token: CancelToken::inactive(),
        }
    }

    /// Idle one-shot timer.
    pub fn once(executor: Arc<TimerExecutor>) -> Self {
        Self::new(executor, false)
    }

    /// Idle repeating timer.
    pub fn repeating(executor: Arc<TimerExecutor>) -> Self {
        Self::new(executor, true)
    }

    /// Arms the timer to call `f` after `ms` (and every `ms` when repeating).
    /// Does nothing if the timer is already running.
    pub fn start<F>(&mut self, ms: u64, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.is_running() {
            return;
        }
        self.interval_ms = ms;
        self.callback = Some(Arc::new(f));
        self.arm();
    }

    /// Cancels the pending fire, if any. Idempotent.
    pub fn stop(&mut self) {
        if !self.token.cancel() {
            return;
        }
        if let Some(id) = self.id {
            self.executor.cancel(id);
        }
    }

    /// Re-arms with the interval and callable of the last `start`. Does
    /// nothing if the timer is running or was never started.
    pub fn restart(&mut self) {
        if self.is_running() {
            return;
        }
        self.arm();
    }

    /// Changes the cadence of a running repeating timer from its next
    /// deadline on. Ignored otherwise, and for zero or unchanged intervals.
    pub fn set_interval(&mut self, ms: u64) {
        if ms == 0 || ms == self.interval_ms || !self.repeat || !self.is_running() {
            return;
        }
        self.interval_ms = ms;
        if let Some(id) = self.id {
            self.executor.set_interval(id, ms);
        }
    }

    /// True while armed, or while a one-shot callback is executing.
    pub fn is_running(&self) -> bool {
        self.token.is_active()
    }

    /// Fixed at construction.
    pub fn is_repeating(&self) -> bool {
        self.repeat
    }

    /// Interval of the current or last arm; 0 before the first start.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Executor id of the current (or last) arm.
    pub fn id(&self) -> Option<TimerId> {
        self.id
    }

    fn arm(&mut self) {
        let Some(callback) = self.callback.clone() else {
            return;
        };

        let token = CancelToken::new();
        let fire_token = token.clone();
        let id = if self.repeat {
            self.executor
                .schedule_repeating(self.interval_ms, move || {
                    if fire_token.is_armed() {
                        callback();
                    }
                })
        } else {
            self.executor.schedule_once(self.interval_ms, move || {
                if fire_token.try_claim() {
                    // Back to idle even if the callback panics.
                    let mut done = DeferStack::new();
                    done.defer(|| fire_token.finish());
                    callback();
                }
            })
        };

        self.token = token;
        self.id = Some(id);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("repeat", &self.repeat)
            .field("interval_ms", &self.interval_ms)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn executor() -> Arc<TimerExecutor> {
        Arc::new(TimerExecutor::with_threads(1).unwrap())
    }

    #[test]
    fn test_restart_before_start_is_noop() {
        let mut timer = Timer::once(executor());
        timer.restart();
        assert!(!timer.is_running());
        assert!(timer.id().is_none());
    }

    #[test]
    fn test_start_twice_keeps_first_arm() {
        let mut timer = Timer::once(executor());
        timer.start(10_000, || {});
        let first = timer.id();
        timer.start(5, || {});
        assert_eq!(timer.id(), first);
        assert_eq!(timer.interval_ms(), 10_000);
    }

    #[test]
    fn test_one_shot_clears_running() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut timer = Timer::once(executor());
        let c = counter.clone();
        timer.start(5, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.is_running());

        thread::sleep(Duration::from_millis(60));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!timer.is_running());

        timer.restart();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_one_shot_running_until_callback_returns() {
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        let mut timer = Timer::once(executor());
        timer.start(1, move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
        });

        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(timer.is_running());
        let id = timer.id();
        timer.start(1, || {});
        assert_eq!(timer.id(), id, "no second arm while the callback runs");

        release_tx.send(()).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while timer.is_running() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!timer.is_running());
    }

    #[test]
    fn test_panicking_one_shot_goes_idle() {
        let mut timer = Timer::once(executor());
        timer.start(1, || panic!("callback failed"));
        thread::sleep(Duration::from_millis(60));
        assert!(!timer.is_running());
    }

    #[test]
    fn test_set_interval_ignored_when_stopped() {
        let mut timer = Timer::repeating(executor());
        timer.set_interval(50);
        assert_eq!(timer.interval_ms(), 0);

        timer.start(10_000, || {});
        timer.set_interval(20_000);
        assert_eq!(timer.interval_ms(), 20_000);
        timer.stop();
        timer.set_interval(30_000);
        assert_eq!(timer.interval_ms(), 20_000);
    }

    #[test]
    fn test_drop_cancels() {
        let exec = executor();
        let id = {
            let mut timer = Timer::once(exec.clone());
            timer.start(10_000, || {});
            timer.id().unwrap()
        };
        assert!(!exec.is_scheduled(id));
    }
}
