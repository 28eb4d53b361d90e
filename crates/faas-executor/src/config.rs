use std::time::Duration;

/// Tunables recognized by a [`crate::FunctionExecutor`], per spec.md §6's
/// `Executor` configuration block.
#[derive(Clone, Copy)]
pub struct ExecutorConfig {
    pub max_concurrent_executions: usize,
    pub max_queue_size: usize,
    pub execution_timeout: Duration,
    pub warm_idle_timeout: Duration,
    pub max_console_output_size: usize,
    pub log_retention: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 10,
            max_queue_size: 100,
            execution_timeout: Duration::from_secs(30),
            warm_idle_timeout: Duration::from_secs(60),
            max_console_output_size: 1000,
            log_retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}
