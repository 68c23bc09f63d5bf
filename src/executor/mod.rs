//! Task execution infrastructure.
//!
//! This module provides the grouped round-robin thread pool along with the
//! task, handle and panic-containment primitives it is built from.

pub mod group_pool;
/// Panic containment shared by pool workers and timer threads.
pub mod panic_handler;
pub mod task;
pub(crate) mod worker;

pub use group_pool::{GroupId, GroupedThreadPool};
pub use panic_handler::{PanicHandler, PanicStrategy, TaskPanic};
pub use task::{TaskHandle, TaskId};

pub(crate) use task::Task;
