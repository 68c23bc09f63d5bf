//! Task representation and the handle returned to submitters.

use super::panic_handler::PanicHandler;
use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a submitted task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Body of a queued task. Returns `false` when the user callable panicked.
pub(crate) type TaskFn = Box<dyn FnOnce(&PanicHandler) -> bool + Send + 'static>;

/// Internal queued task. Dropping it without running it closes its handle.
pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) func: TaskFn,
    pub(crate) enqueue_time: Instant,
}

impl Task {
    pub fn with_id<F>(id: TaskId, f: F) -> Self
    where
        F: FnOnce(&PanicHandler) -> bool + Send + 'static,
    {
        Task {
            id,
            func: Box::new(f),
            enqueue_time: Instant::now(),
        }
    }

    /// Wraps a callable whose value is delivered through the returned handle.
    pub fn with_handle<F, R>(f: F) -> (Self, TaskHandle<R>)
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (id, tx, handle) = task_channel();
        let task = Task::with_id(id, move |handler: &PanicHandler| {
            match handler.execute(id, f) {
                Ok(value) => {
                    let _ = tx.send(Ok(value));
                    true
                }
                Err(panic) => {
                    let _ = tx.send(Err(panic.into()));
                    false
                }
            }
        });
        (task, handle)
    }

    /// Wraps a callable nobody waits on; a panic is only logged.
    pub fn detached<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let id = TaskId::next();
        Task::with_id(id, move |handler: &PanicHandler| handler.execute(id, f).is_ok())
    }

    pub fn execute(self, handler: &PanicHandler) -> bool {
        (self.func)(handler)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("enqueue_time", &self.enqueue_time)
            .finish()
    }
}

/// Creates the sending half held by the task closure and the handle given
/// back to the submitter.
pub(crate) fn task_channel<T>() -> (TaskId, Sender<Result<T>>, TaskHandle<T>) {
    let id = TaskId::next();
    let (tx, rx) = bounded(1);
    let handle = TaskHandle {
        id,
        receiver: rx,
        outcome: Mutex::new(None),
    };
    (id, tx, handle)
}

/// Future-like handle to the result of a pool task.
///
/// Resolves to the task's value, `Error::TaskFailed` if it panicked, or
/// `Error::TaskCanceled` if the task was discarded (group removed, pool shut
/// down without draining) before it ran.
pub struct TaskHandle<T> {
    id: TaskId,
    receiver: Receiver<Result<T>>,
    // Result pulled out by `is_finished` and not yet handed to the caller.
    outcome: Mutex<Option<Result<T>>>,
}

impl<T> TaskHandle<T> {
    /// Id of the task this handle waits on.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Blocks until the task finishes or is discarded.
    pub fn join(self) -> Result<T> {
        if let Some(outcome) = self.outcome.lock().take() {
            return outcome;
        }
        self.receiver.recv().unwrap_or(Err(Error::TaskCanceled))
    }

    /// Blocks for at most `timeout`. `None` means the task is still pending.
    pub fn join_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        if let Some(outcome) = self.outcome.lock().take() {
            return Some(outcome);
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(Error::TaskCanceled)),
        }
    }

    /// Non-blocking poll. `None` means the task is still pending.
    pub fn try_join(&self) -> Option<Result<T>> {
        if let Some(outcome) = self.outcome.lock().take() {
            return Some(outcome);
        }
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::TaskCanceled)),
        }
    }

    /// True once the task produced an outcome or was discarded.
    pub fn is_finished(&self) -> bool {
        let mut outcome = self.outcome.lock();
        if outcome.is_some() {
            return true;
        }
        match self.receiver.try_recv() {
            Ok(result) => {
                *outcome = Some(result);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                *outcome = Some(Err(Error::TaskCanceled));
                true
            }
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id).finish()
    }
}
