//! `use tempo_rs::prelude::*;` brings in the types most callers need.

pub use crate::config::{PoolConfig, TimerConfig};
pub use crate::error::{Error, Result};
pub use crate::executor::{GroupId, GroupedThreadPool, PanicStrategy, TaskHandle};
pub use crate::sync::SpinLock;
pub use crate::timer::{Timer, TimerExecutor, TimerId};
pub use crate::util::DeferStack;
