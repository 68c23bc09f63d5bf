use crate::executor::group_pool::GroupId;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the pool, the timer executor and config validation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Submission or lookup named a group that is not registered.
    #[error("task group {0} not found")]
    GroupNotFound(GroupId),

    /// Submission after shutdown.
    #[error("submit on stopped thread pool")]
    PoolStopped,

    /// The task panicked; carries the panic message.
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// The task was dropped from its queue before running.
    #[error("task was discarded before it ran")]
    TaskCanceled,

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Thread spawn failure or an operation refused by the executor state.
    #[error("executor error: {0}")]
    Executor(String),
}

impl Error {
    /// Builds [`Error::Config`].
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Builds [`Error::Executor`].
    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }
}
