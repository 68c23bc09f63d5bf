//! Worker pool that services several task groups in round-robin order.

use super::panic_handler::PanicHandler;
use super::task::{Task, TaskHandle};
use super::worker::{self, WorkerSet};
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::stats::{ExecutorStats, StatsSnapshot};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;
use std::thread;

/// Identifier of a task group.
pub type GroupId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Front,
    Back,
}

/// Group table and scheduling cursor, guarded by one mutex.
#[derive(Debug, Default)]
pub(crate) struct PoolState {
    groups: BTreeMap<GroupId, VecDeque<Task>>,
    // Next group to examine; `None` restarts from the lowest id. Always names
    // a live group when set.
    cursor: Option<GroupId>,
    stop: bool,
    drain: bool,
}

impl PoolState {
    /// Takes the head task of the first non-empty group at or after the
    /// cursor, wrapping around, and moves the cursor past that group.
    pub(crate) fn pop_round_robin(&mut self) -> Option<Task> {
        let start = self.cursor.unwrap_or(GroupId::MIN);
        let group = self
            .groups
            .range(start..)
            .chain(self.groups.range(..start))
            .find(|(_, queue)| !queue.is_empty())
            .map(|(id, _)| *id)?;

        let task = self.groups.get_mut(&group)?.pop_front();
        self.cursor = self.group_after(group);
        task
    }

    fn group_after(&self, group: GroupId) -> Option<GroupId> {
        self.groups
            .range((Excluded(group), Unbounded))
            .next()
            .map(|(id, _)| *id)
    }

    fn remove(&mut self, group: GroupId) -> Option<VecDeque<Task>> {
        if self.cursor == Some(group) {
            self.cursor = self.group_after(group);
        }
        self.groups.remove(&group)
    }

    fn take_all(&mut self) -> Vec<Task> {
        self.groups.values_mut().flat_map(|q| q.drain(..)).collect()
    }

    fn is_idle(&self) -> bool {
        self.groups.values().all(VecDeque::is_empty)
    }
}

pub(crate) struct PoolShared {
    pub(crate) state: Mutex<PoolState>,
    pub(crate) condvar: Condvar,
    pub(crate) panic_handler: PanicHandler,
    pub(crate) stats: ExecutorStats,
}

impl PoolShared {
    /// Blocks until a task is available or the pool should exit.
    pub(crate) fn next_task(&self) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if state.stop && !state.drain {
                return None;
            }
            if let Some(task) = state.pop_round_robin() {
                return Some(task);
            }
            if state.stop {
                return None;
            }
            self.condvar.wait(&mut state);
        }
    }
}

/// Fixed set of worker threads draining multiple named task groups.
///
/// Each group is FIFO internally (with [`submit_front`](Self::submit_front)
/// as a priority override). Idle workers pick groups in rotation, so a busy
/// group cannot starve the others.
pub struct GroupedThreadPool {
    shared: Arc<PoolShared>,
    workers: WorkerSet,
    num_threads: usize,
    drain_on_shutdown: bool,
}

impl GroupedThreadPool {
    /// Validates `config` and spawns the workers. No groups exist yet.
    ///
    /// Fails with `Error::Config` for a bad config and `Error::Executor` if a
    /// thread cannot be spawned.
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let num_threads = config.worker_threads();

        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState::default()),
            condvar: Condvar::new(),
            panic_handler: PanicHandler::new(config.panic_strategy),
            stats: ExecutorStats::new(),
        });

        let pool = Self {
            shared,
            workers: WorkerSet::new(),
            num_threads,
            drain_on_shutdown: config.drain_on_shutdown,
        };

        for id in 0..num_threads {
            let name = format!("{}-{}", config.thread_name_prefix, id);
            let mut builder = thread::Builder::new().name(name);
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let shared = pool.shared.clone();
            // On failure `pool` is dropped, which stops the workers spawned so far.
            let handle = builder
                .spawn(move || worker::run(shared, id))
                .map_err(|e| Error::executor(format!("spawn failed: {}", e)))?;
            pool.workers.push(handle);
        }

        tracing::info!(threads = num_threads, "grouped thread pool started");
        Ok(pool)
    }

    /// Pool with `threads` workers and default settings otherwise.
    pub fn with_threads(threads: usize) -> Result<Self> {
        Self::new(PoolConfig::builder().num_threads(threads).build()?)
    }

    /// Creates an empty group. Adding an existing group is a no-op.
    pub fn add_group(&self, group: GroupId) {
        let mut state = self.shared.state.lock();
        state.groups.entry(group).or_default();
        tracing::debug!(group, "task group added");
    }

    /// Removes a group and discards the tasks still queued in it. Their
    /// handles resolve to [`Error::TaskCanceled`]. Tasks already picked up by
    /// a worker run to completion. Returns the number of discarded tasks.
    pub fn remove_group(&self, group: GroupId) -> usize {
        let removed = self.shared.state.lock().remove(group);
        self.shared.condvar.notify_all();

        let Some(queue) = removed else {
            return 0;
        };
        let discarded = queue.len();
        if discarded > 0 {
            tracing::warn!(group, discarded, "task group removed with pending tasks");
            self.shared.stats.record_discarded(discarded as u64);
        } else {
            tracing::debug!(group, "task group removed");
        }
        // Queued closures are dropped here, outside the lock.
        drop(queue);
        discarded
    }

    /// True if `group` is registered.
    pub fn has_group(&self, group: GroupId) -> bool {
        self.shared.state.lock().groups.contains_key(&group)
    }

    /// Number of registered groups.
    pub fn group_count(&self) -> usize {
        self.shared.state.lock().groups.len()
    }

    /// Number of tasks queued (not yet running) in `group`.
    pub fn pending_tasks(&self, group: GroupId) -> Option<usize> {
        self.shared.state.lock().groups.get(&group).map(VecDeque::len)
    }

    /// Appends `f` to the tail of `group`.
    pub fn submit_back<F, R>(&self, group: GroupId, f: F) -> Result<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (task, handle) = Task::with_handle(f);
        self.enqueue(group, Position::Back, task)?;
        Ok(handle)
    }

    /// Inserts `f` at the head of `group`, ahead of everything already queued
    /// there.
    pub fn submit_front<F, R>(&self, group: GroupId, f: F) -> Result<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (task, handle) = Task::with_handle(f);
        self.enqueue(group, Position::Front, task)?;
        Ok(handle)
    }

    /// Fire-and-forget form of [`submit_back`](Self::submit_back).
    pub fn execute_back<F>(&self, group: GroupId, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(group, Position::Back, Task::detached(f))
    }

    /// Fire-and-forget form of [`submit_front`](Self::submit_front).
    pub fn execute_front<F>(&self, group: GroupId, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(group, Position::Front, Task::detached(f))
    }

    fn enqueue(&self, group: GroupId, position: Position, task: Task) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            let stopped = state.stop;
            let queue = state
                .groups
                .get_mut(&group)
                .ok_or(Error::GroupNotFound(group))?;
            if stopped {
                return Err(Error::PoolStopped);
            }
            match position {
                Position::Front => queue.push_front(task),
                Position::Back => queue.push_back(task),
            }
        }
        self.shared.stats.record_submitted();
        self.shared.condvar.notify_one();
        Ok(())
    }

    /// Stops the pool and joins its workers.
    ///
    /// With `drain == false` workers exit as soon as they are woken and
    /// queued tasks are discarded. With `drain == true` they keep servicing
    /// groups until every queue is empty. Only the first call decides the
    /// drain mode; later calls wait for the workers like the first one.
    ///
    /// Called from inside a task, the calling worker is not joined (it exits
    /// once the task returns); a later `shutdown` or the drop from another
    /// thread joins it.
    pub fn shutdown(&self, drain: bool) {
        {
            let mut state = self.shared.state.lock();
            if !state.stop {
                state.stop = true;
                state.drain = drain;
                tracing::info!(drain, "grouped thread pool shutting down");
            }
        }
        self.shared.condvar.notify_all();

        // A task's own shutdown gives way to one already joining.
        let Some(mut workers) = self.workers.acquire() else {
            return;
        };
        self.workers.join_all(&mut workers, "pool");
        drop(workers);

        let leftovers = {
            let mut state = self.shared.state.lock();
            if state.drain {
                Vec::new()
            } else {
                state.take_all()
            }
        };
        if !leftovers.is_empty() {
            tracing::warn!(discarded = leftovers.len(), "queued tasks discarded at shutdown");
            self.shared.stats.record_discarded(leftovers.len() as u64);
        }
    }

    /// True once [`shutdown`](Self::shutdown) has been called.
    pub fn is_stopped(&self) -> bool {
        self.shared.state.lock().stop
    }

    /// True when no group has queued work.
    pub fn is_idle(&self) -> bool {
        self.shared.state.lock().is_idle()
    }

    /// Worker count fixed at construction.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Queue delay and task counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl Drop for GroupedThreadPool {
    fn drop(&mut self) {
        self.shutdown(self.drain_on_shutdown);
    }
}

impl std::fmt::Debug for GroupedThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupedThreadPool")
            .field("num_threads", &self.num_threads)
            .field("groups", &self.group_count())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn queue_marker(state: &mut PoolState, group: GroupId, tag: usize, log: &Arc<Mutex<Vec<usize>>>) {
        let log = log.clone();
        state
            .groups
            .entry(group)
            .or_default()
            .push_back(Task::detached(move || log.lock().push(tag)));
    }

    fn drain_state(state: &mut PoolState) {
        let handler = PanicHandler::default();
        while let Some(task) = state.pop_round_robin() {
            task.execute(&handler);
        }
    }

    #[test]
    fn test_round_robin_rotation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut state = PoolState::default();
        for i in 0..3 {
            queue_marker(&mut state, 1, 10 + i, &log);
            queue_marker(&mut state, 2, 20 + i, &log);
            queue_marker(&mut state, 3, 30 + i, &log);
        }

        drain_state(&mut state);
        assert_eq!(
            *log.lock(),
            vec![10, 20, 30, 11, 21, 31, 12, 22, 32]
        );
    }

    #[test]
    fn test_rotation_skips_empty_groups() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut state = PoolState::default();
        state.groups.insert(1, VecDeque::new());
        queue_marker(&mut state, 2, 1, &log);
        queue_marker(&mut state, 2, 2, &log);
        state.groups.insert(3, VecDeque::new());

        drain_state(&mut state);
        assert_eq!(*log.lock(), vec![1, 2]);
        assert!(state.is_idle());
    }

    #[test]
    fn test_cursor_repositioned_on_removal() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut state = PoolState::default();
        queue_marker(&mut state, 1, 1, &log);
        queue_marker(&mut state, 2, 2, &log);
        queue_marker(&mut state, 3, 3, &log);

        if let Some(task) = state.pop_round_robin() {
            task.execute(&PanicHandler::default());
        }
        assert_eq!(state.cursor, Some(2));

        state.remove(2);
        assert_eq!(state.cursor, Some(3));

        state.remove(3);
        assert_eq!(state.cursor, None);

        drain_state(&mut state);
        assert_eq!(*log.lock(), vec![1]);
    }

    #[test]
    fn test_unknown_group_rejected() {
        let pool = GroupedThreadPool::with_threads(1).unwrap();
        let err = pool.submit_back(9, || ()).unwrap_err();
        assert!(matches!(err, Error::GroupNotFound(9)));
    }

    #[test]
    fn test_submit_after_shutdown() {
        let pool = GroupedThreadPool::with_threads(1).unwrap();
        pool.add_group(1);
        pool.shutdown(false);
        assert!(matches!(
            pool.submit_back(1, || ()).unwrap_err(),
            Error::PoolStopped
        ));
    }

    #[test]
    fn test_add_group_idempotent() {
        let pool = GroupedThreadPool::with_threads(1).unwrap();
        pool.add_group(4);
        pool.add_group(4);
        assert_eq!(pool.group_count(), 1);
        assert!(pool.has_group(4));
        assert_eq!(pool.remove_group(4), 0);
        assert!(!pool.has_group(4));
    }

    #[test]
    fn test_execute_detached() {
        let pool = GroupedThreadPool::with_threads(2).unwrap();
        pool.add_group(0);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = counter.clone();
            pool.execute_back(0, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown(true);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(pool.stats().executed, 10);
    }

    #[test]
    fn test_panic_does_not_kill_worker() {
        let pool = GroupedThreadPool::with_threads(1).unwrap();
        pool.add_group(0);
        let bad = pool.submit_back(0, || -> i32 { panic!("nope") }).unwrap();
        assert!(matches!(bad.join(), Err(Error::TaskFailed(_))));

        let good = pool.submit_back(0, || 7).unwrap();
        assert_eq!(
            good.join_timeout(Duration::from_secs(5)).unwrap().unwrap(),
            7
        );
        assert_eq!(pool.stats().panicked, 1);
    }
}
