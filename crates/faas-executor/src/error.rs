use thiserror::Error;

/// Stable executor-path error kinds, per spec.md §7. `QueueFull` is the only
/// variant surfaced as a Rust `Err`; user errors, timeouts, and aborts are
/// folded into an unsuccessful [`crate::ExecutionOutcome`] instead (spec.md
/// §7 "never raised as exceptions to the executor surface").
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    #[error("request rejected: queue is full")]
    QueueFull,
}
