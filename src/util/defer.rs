//! Scope-exit cleanup.

use std::fmt;

/// Stack of cleanup closures run in reverse registration order when the
/// stack is dropped, on every exit path including early returns and panics.
#[derive(Default)]
pub struct DeferStack<'a> {
    actions: Vec<Box<dyn FnOnce() + 'a>>,
}

impl<'a> DeferStack<'a> {
    /// Empty stack.
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Registers `f`; it runs before everything registered earlier.
    pub fn defer<F>(&mut self, f: F)
    where
        F: FnOnce() + 'a,
    {
        self.actions.push(Box::new(f));
    }

    /// Runs every pending action now, newest first.
    pub fn run(&mut self) {
        while let Some(action) = self.actions.pop() {
            action();
        }
    }

    /// Forgets all pending actions without running them.
    pub fn dismiss(&mut self) {
        self.actions.clear();
    }

    /// Pending action count.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Drop for DeferStack<'_> {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for DeferStack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferStack")
            .field("pending", &self.actions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_reverse_order() {
        let log = RefCell::new(Vec::new());
        {
            let mut defer = DeferStack::new();
            defer.defer(|| log.borrow_mut().push(1));
            defer.defer(|| log.borrow_mut().push(2));
            defer.defer(|| log.borrow_mut().push(3));
        }
        assert_eq!(*log.borrow(), vec![3, 2, 1]);
    }

    #[test]
    fn test_runs_on_early_return() {
        fn work(log: &RefCell<Vec<&'static str>>, bail: bool) -> Option<()> {
            let mut defer = DeferStack::new();
            defer.defer(|| log.borrow_mut().push("released"));
            if bail {
                return None;
            }
            log.borrow_mut().push("done");
            Some(())
        }

        let log = RefCell::new(Vec::new());
        assert!(work(&log, true).is_none());
        assert_eq!(*log.borrow(), vec!["released"]);
    }

    #[test]
    fn test_dismiss() {
        let log = RefCell::new(Vec::<i32>::new());
        {
            let mut defer = DeferStack::new();
            defer.defer(|| log.borrow_mut().push(1));
            assert_eq!(defer.len(), 1);
            defer.dismiss();
            assert!(defer.is_empty());
        }
        assert!(log.borrow().is_empty());
    }
}
