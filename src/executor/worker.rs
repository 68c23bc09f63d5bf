// pool worker thread, and the handle set both executors join on stop
use super::group_pool::PoolShared;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

pub(crate) type WorkerId = usize;

// main loop: take the next round-robin task until the pool says stop
pub(crate) fn run(shared: Arc<PoolShared>, id: WorkerId) {
    tracing::debug!(worker = id, "pool worker started");

    while let Some(task) = shared.next_task() {
        let queued_for = task.enqueue_time.elapsed();
        let task_id = task.id;

        // panics are contained inside the task body
        if !task.execute(&shared.panic_handler) {
            tracing::debug!(worker = id, task = %task_id, "task finished with panic");
            shared.stats.record_panic();
        }
        shared.stats.record_executed(queued_for);
    }

    tracing::debug!(worker = id, "pool worker exiting");
}

/// Join handles of an executor's worker threads.
///
/// The handle list stays locked for the whole join, so a second stop waits
/// for the first one to finish. A worker that asks for a stop from inside a
/// task keeps its own handle in the list; the next stop (or drop) issued from
/// another thread joins it.
#[derive(Debug, Default)]
pub(crate) struct WorkerSet {
    handles: Mutex<Vec<JoinHandle<()>>>,
    // Ids of the threads in `handles`, readable while a join holds the list.
    ids: Mutex<Vec<ThreadId>>,
}

impl WorkerSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// True when called from one of the listed worker threads.
    pub(crate) fn is_member(&self) -> bool {
        let current = thread::current().id();
        self.ids.lock().contains(&current)
    }

    /// Locks the handle list. Worker threads only try: whoever holds the
    /// lock may be joining them, and waiting would deadlock.
    pub(crate) fn acquire(&self) -> Option<MutexGuard<'_, Vec<JoinHandle<()>>>> {
        if self.is_member() {
            self.handles.try_lock()
        } else {
            Some(self.handles.lock())
        }
    }

    pub(crate) fn add(&self, handles: &mut Vec<JoinHandle<()>>, handle: JoinHandle<()>) {
        self.ids.lock().push(handle.thread().id());
        handles.push(handle);
    }

    pub(crate) fn push(&self, handle: JoinHandle<()>) {
        let mut handles = self.handles.lock();
        self.add(&mut handles, handle);
    }

    /// Joins every listed thread except the caller.
    pub(crate) fn join_all(&self, handles: &mut Vec<JoinHandle<()>>, kind: &'static str) {
        let current = thread::current().id();
        let mut own = None;
        let pending: Vec<_> = handles.drain(..).collect();
        for handle in pending {
            let id = handle.thread().id();
            if id == current {
                own = Some(handle);
                continue;
            }
            if handle.join().is_err() {
                tracing::error!(critical = true, kind, "worker terminated unexpectedly");
            }
            self.ids.lock().retain(|t| *t != id);
        }
        handles.extend(own);
    }

    pub(crate) fn len(&self) -> usize {
        self.ids.lock().len()
    }
}
