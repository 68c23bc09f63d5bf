//! tempo - in-process scheduling primitives
//!
//! Three independent building blocks:
//!
//! - [`GroupedThreadPool`]: fixed workers servicing several task groups in
//!   round-robin order, FIFO within a group, with front insertion for
//!   priority work.
//! - [`TimerExecutor`] and [`Timer`]: one-shot and repeating callables fired
//!   from a deadline-ordered min-heap.
//! - [`SpinLock`]: busy-wait lock for very short critical sections.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tempo_rs::prelude::*;
//!
//! let pool = GroupedThreadPool::with_threads(2).unwrap();
//! pool.add_group(1);
//! let handle = pool.submit_back(1, || 6 * 7).unwrap();
//! assert_eq!(handle.join().unwrap(), 42);
//!
//! let executor = Arc::new(TimerExecutor::with_threads(1).unwrap());
//! let mut timer = Timer::repeating(executor.clone());
//! timer.start(100, || println!("tick"));
//! ```
//!
//! Diagnostics go through [`tracing`]; install a subscriber to see them.
//! The three subsystems never take each other's locks.

#![warn(missing_docs, missing_debug_implementations)]

/// Pool and timer executor settings.
pub mod config;
/// Crate error type.
pub mod error;
pub mod executor;
/// Common imports.
pub mod prelude;
pub mod stats;
/// Spin lock and its backoff.
pub mod sync;
pub mod timer;
/// Small helpers.
pub mod util;

pub use config::{PoolConfig, PoolConfigBuilder, TimerConfig, TimerConfigBuilder};
pub use error::{Error, Result};
pub use executor::{GroupId, GroupedThreadPool, PanicStrategy, TaskHandle, TaskId};
pub use stats::StatsSnapshot;
pub use sync::{SpinLock, SpinLockGuard};
pub use timer::{CancelToken, Timer, TimerExecutor, TimerId};
