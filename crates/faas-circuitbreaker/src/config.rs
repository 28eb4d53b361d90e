use std::time::Duration;

use faas_core::EventListeners;

use crate::events::CircuitBreakerEvent;

/// Tunables for a single function's circuit breaker, matching spec.md's
/// `circuitBreaker` configuration block.
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub success_threshold: usize,
    pub reset_timeout: Duration,
    pub max_half_open_requests: usize,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
            max_half_open_requests: 1,
            event_listeners: EventListeners::new(),
        }
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, n: usize) -> Self {
        self.config.failure_threshold = n;
        self
    }

    pub fn success_threshold(mut self, n: usize) -> Self {
        self.config.success_threshold = n;
        self
    }

    pub fn reset_timeout(mut self, d: Duration) -> Self {
        self.config.reset_timeout = d;
        self
    }

    pub fn max_half_open_requests(mut self, n: usize) -> Self {
        self.config.max_half_open_requests = n;
        self
    }

    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.config
            .event_listeners
            .add(faas_core::FnListener::new(listener));
        self
    }

    pub fn build(self) -> CircuitBreakerConfig {
        self.config
    }
}
