use crate::error::{Error, Result};
use crate::executor::PanicStrategy;

const MAX_THREADS: usize = 1024;

/// Settings for a [`GroupedThreadPool`](crate::GroupedThreadPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Worker count; `None` means one per logical CPU.
    pub num_threads: Option<usize>,
    /// Workers are named `<prefix>-<index>`.
    pub thread_name_prefix: String,
    /// Stack size in bytes for each worker.
    pub stack_size: Option<usize>,
    /// Whether dropping the pool runs every queued task before the workers exit.
    pub drain_on_shutdown: bool,
    /// What a panicking task does to its worker.
    pub panic_strategy: PanicStrategy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name_prefix: "tempo-pool".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            drain_on_shutdown: false,
            panic_strategy: PanicStrategy::default(),
        }
    }
}

impl PoolConfig {
    /// Starts from the defaults.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// Rejects a zero or oversized thread count and an empty name prefix.
    pub fn validate(&self) -> Result<()> {
        validate_threads(self.num_threads)?;
        validate_prefix(&self.thread_name_prefix)
    }

    /// Resolved worker count.
    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

/// Builder for [`PoolConfig`].
#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Builder seeded with [`PoolConfig::default`].
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    /// Sets the worker count.
    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    /// Sets the worker name prefix.
    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Sets the worker stack size in bytes.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Run queued tasks on drop instead of discarding them.
    pub fn drain_on_shutdown(mut self, drain: bool) -> Self {
        self.config.drain_on_shutdown = drain;
        self
    }

    /// Sets the panic strategy.
    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    /// Validates and returns the config.
    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Settings for a [`TimerExecutor`](crate::TimerExecutor).
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// Dispatch threads. Callbacks run on these, so a slow callback delays
    /// others when there is only one.
    pub num_threads: usize,
    /// Dispatch threads are named `<prefix>-<index>`.
    pub thread_name_prefix: String,
    /// Stack size in bytes for each dispatch thread.
    pub stack_size: Option<usize>,
    /// What a panicking callback does to its dispatch thread.
    pub panic_strategy: PanicStrategy,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            num_threads: 1,
            thread_name_prefix: "tempo-timer".to_string(),
            stack_size: None,
            panic_strategy: PanicStrategy::default(),
        }
    }
}

impl TimerConfig {
    /// Starts from the defaults.
    pub fn builder() -> TimerConfigBuilder {
        TimerConfigBuilder::new()
    }

    /// Same bounds as [`PoolConfig::validate`].
    pub fn validate(&self) -> Result<()> {
        validate_threads(Some(self.num_threads))?;
        validate_prefix(&self.thread_name_prefix)
    }
}

/// Builder for [`TimerConfig`].
#[derive(Debug, Default)]
pub struct TimerConfigBuilder {
    config: TimerConfig,
}

impl TimerConfigBuilder {
    /// Builder seeded with [`TimerConfig::default`].
    pub fn new() -> Self {
        Self {
            config: TimerConfig::default(),
        }
    }

    /// Sets the dispatch thread count.
    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = n;
        self
    }

    /// Sets the dispatch thread name prefix.
    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Sets the dispatch thread stack size in bytes.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Sets the panic strategy.
    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    /// Validates and returns the config.
    pub fn build(self) -> Result<TimerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn validate_threads(num_threads: Option<usize>) -> Result<()> {
    if let Some(n) = num_threads {
        if n == 0 {
            return Err(Error::config("num_threads must be > 0"));
        }
        if n > MAX_THREADS {
            return Err(Error::config(format!(
                "num_threads too large (max {})",
                MAX_THREADS
            )));
        }
    }
    Ok(())
}

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.contains('\0') {
        return Err(Error::config("thread_name_prefix must not contain NUL"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_defaults() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.worker_threads() >= 1);
        assert!(!config.drain_on_shutdown);
    }

    #[test]
    fn test_pool_builder_rejects_zero_threads() {
        assert!(PoolConfig::builder().num_threads(0).build().is_err());
        assert!(PoolConfig::builder().num_threads(2000).build().is_err());
    }

    #[test]
    fn test_pool_builder() {
        let config = PoolConfig::builder()
            .num_threads(3)
            .drain_on_shutdown(true)
            .thread_name_prefix("grp")
            .build()
            .unwrap();

        assert_eq!(config.worker_threads(), 3);
        assert!(config.drain_on_shutdown);
        assert_eq!(config.thread_name_prefix, "grp");
    }

    #[test]
    fn test_timer_builder() {
        let config = TimerConfig::builder().num_threads(2).build().unwrap();
        assert_eq!(config.num_threads, 2);
        assert!(TimerConfig::builder().num_threads(0).build().is_err());
        assert!(TimerConfig::builder()
            .thread_name_prefix("bad\0name")
            .build()
            .is_err());
    }
}
