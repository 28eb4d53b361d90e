use std::time::Instant;

use thiserror::Error;

/// Stable loader-path error kinds, per spec.md §7.
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    #[error("function not found")]
    FunctionNotFound,
    #[error("loader service error (status {status_code})")]
    LoaderServiceError { status_code: u16 },
    #[error("load timed out after {timeout_ms}ms")]
    LoadTimeout { timeout_ms: u64 },
    #[error("compilation error: {details}")]
    CompilationError { details: String },
    #[error("circuit breaker open after {failures} failures")]
    CircuitBreakerOpen {
        failures: usize,
        last_failure_time: Option<Instant>,
    },
    #[error("no loader configured")]
    NoLoaderConfigured,
    #[error("load error: {0}")]
    LoadError(String),
}
