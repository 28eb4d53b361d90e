use std::time::Instant;

use thiserror::Error;

/// Error returned when a call is rejected by the circuit breaker.
#[derive(Debug, Error, Clone, Copy)]
#[error("circuit breaker open after {failures} failures; last failure at {last_failure_time:?}")]
pub struct CircuitBreakerOpen {
    pub failures: usize,
    pub last_failure_time: Option<Instant>,
}
