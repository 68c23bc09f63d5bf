use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// How a worker reacts when a callable panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    /// Log a critical event and abort the process.
    Abort,
    /// Contain the panic silently.
    Isolate,
    /// Contain the panic and log it at error level.
    #[default]
    LogAndContinue,
}

/// Contains panics raised by user callables so worker threads survive them.
#[derive(Debug)]
pub struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    /// Handler with a zero panic count.
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
        }
    }

    /// Runs `f`, returning its value or the captured panic. `origin` names the
    /// task or timer in log output.
    pub fn execute<O, F, R>(&self, origin: O, f: F) -> Result<R, TaskPanic>
    where
        O: fmt::Display,
        F: FnOnce() -> R,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Ok(result),
            Err(payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);

                let panic = TaskPanic::from_payload(payload);

                match self.strategy {
                    PanicStrategy::Abort => {
                        tracing::error!(
                            critical = true,
                            origin = %origin,
                            "callable panicked (abort strategy): {}",
                            panic.message
                        );
                        std::process::abort();
                    }
                    PanicStrategy::Isolate => {}
                    PanicStrategy::LogAndContinue => {
                        tracing::error!(origin = %origin, "callable panicked: {}", panic.message);
                    }
                }

                Err(panic)
            }
        }
    }

    /// Panics caught since creation or the last reset.
    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    /// Zeroes the panic count.
    pub fn reset_count(&self) {
        self.panic_count.store(0, Ordering::Relaxed);
    }

    /// Strategy fixed at construction.
    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}

/// A caught panic, reduced to its message.
#[derive(Debug, Clone)]
pub struct TaskPanic {
    /// Panic payload if it was a string, `"unknown panic"` otherwise.
    pub message: String,
}

impl TaskPanic {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };

        Self { message }
    }
}

impl From<TaskPanic> for crate::error::Error {
    fn from(panic: TaskPanic) -> Self {
        crate::error::Error::TaskFailed(panic.message)
    }
}
