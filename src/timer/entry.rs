use super::TimerId;
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub(crate) type TimerCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// A scheduled callable, shared between the heap and the id index.
pub(crate) struct TimerEntry {
    pub(crate) id: TimerId,
    // Zero means one-shot.
    interval_us: AtomicU64,
    stopped: AtomicBool,
    callback: TimerCallback,
}

impl TimerEntry {
    pub fn new(id: TimerId, interval_us: u64, callback: TimerCallback) -> Self {
        Self {
            id,
            interval_us: AtomicU64::new(interval_us),
            stopped: AtomicBool::new(false),
            callback,
        }
    }

    pub fn interval_us(&self) -> u64 {
        self.interval_us.load(Ordering::Acquire)
    }

    pub fn set_interval_us(&self, interval_us: u64) {
        self.interval_us.store(interval_us, Ordering::Release);
    }

    pub fn is_repeating(&self) -> bool {
        self.interval_us() > 0
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn invoke(&self) {
        (self.callback)();
    }
}

impl fmt::Debug for TimerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEntry")
            .field("id", &self.id)
            .field("interval_us", &self.interval_us())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Heap position of an entry. The deadline is fixed while the slot is in the
/// heap; a repeating entry gets a new slot for each cycle.
#[derive(Debug)]
pub(crate) struct HeapSlot {
    pub(crate) next_run_us: u64,
    pub(crate) entry: std::sync::Arc<TimerEntry>,
}

impl PartialEq for HeapSlot {
    fn eq(&self, other: &Self) -> bool {
        self.next_run_us == other.next_run_us && self.entry.id == other.entry.id
    }
}

impl Eq for HeapSlot {}

impl PartialOrd for HeapSlot {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

// BinaryHeap is a max-heap: the earliest deadline must compare greatest.
impl Ord for HeapSlot {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .next_run_us
            .cmp(&self.next_run_us)
            .then_with(|| other.entry.id.cmp(&self.entry.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;
    use std::sync::Arc;

    fn slot(id: u64, next_run_us: u64) -> HeapSlot {
        HeapSlot {
            next_run_us,
            entry: Arc::new(TimerEntry::new(TimerId(id), 0, Box::new(|| {}))),
        }
    }

    #[test]
    fn test_earliest_deadline_first() {
        let mut heap = BinaryHeap::new();
        heap.push(slot(1, 300));
        heap.push(slot(2, 100));
        heap.push(slot(3, 200));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop())
            .map(|s| s.next_run_us)
            .collect();
        assert_eq!(order, vec![100, 200, 300]);
    }

    #[test]
    fn test_entry_flags() {
        let entry = TimerEntry::new(TimerId(1), 0, Box::new(|| {}));
        assert!(!entry.is_repeating());
        entry.set_interval_us(5_000);
        assert!(entry.is_repeating());

        assert!(!entry.is_stopped());
        entry.stop();
        assert!(entry.is_stopped());
    }
}
