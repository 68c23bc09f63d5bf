pub mod backoff;
pub mod spin_lock;

pub use backoff::YieldBackoff;
pub use spin_lock::{SpinLock, SpinLockGuard};
