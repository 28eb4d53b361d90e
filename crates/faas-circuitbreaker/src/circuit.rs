use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

use faas_core::FunctionId;

use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;

/// Three-state circuit breaker state, matching spec.md's closed/open/half-open
/// machine. `#[repr(u8)]` so it can be snapshotted lock-free via an atomic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Per-function circuit breaker instance. Created lazily by
/// [`crate::registry::CircuitBreakerRegistry`] and survives for the lifetime
/// of the process (spec.md §3 Circuit Breaker State).
pub struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    failures: usize,
    successes: usize,
    half_open_in_flight: usize,
    last_failure_time: Option<Instant>,
}

impl Circuit {
    pub(crate) fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic: Arc::new(AtomicU8::new(CircuitState::Closed as u8)),
            last_state_change: Instant::now(),
            failures: 0,
            successes: 0,
            half_open_in_flight: 0,
            last_failure_time: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    pub fn last_failure_time(&self) -> Option<Instant> {
        self.last_failure_time
    }

    pub fn failure_count(&self) -> usize {
        self.failures
    }

    /// Admission decision for `function_id`. Performs the open→half-open
    /// transition inline on the request path when `resetTimeout` has
    /// elapsed, as spec.md §4.A requires.
    pub fn admit(&mut self, function_id: &FunctionId, config: &CircuitBreakerConfig) -> bool {
        match self.state {
            CircuitState::Closed => {
                self.emit_admission(function_id, config, true);
                true
            }
            CircuitState::Open => {
                if self.last_state_change.elapsed() >= config.reset_timeout {
                    self.transition_to(CircuitState::HalfOpen, function_id, config);
                    self.half_open_in_flight = 1;
                    self.emit_admission(function_id, config, true);
                    true
                } else {
                    self.emit_admission(function_id, config, false);
                    false
                }
            }
            CircuitState::HalfOpen => {
                let permitted = self.half_open_in_flight < config.max_half_open_requests;
                if permitted {
                    self.half_open_in_flight += 1;
                }
                self.emit_admission(function_id, config, permitted);
                permitted
            }
        }
    }

    pub fn record_success(&mut self, function_id: &FunctionId, config: &CircuitBreakerConfig) {
        match self.state {
            CircuitState::HalfOpen => {
                self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
                self.successes += 1;
                if self.successes >= config.success_threshold {
                    self.transition_to(CircuitState::Closed, function_id, config);
                }
            }
            _ => {
                if self.failures > 0 {
                    self.failures = 0;
                }
            }
        }

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                function_id: function_id.clone(),
                timestamp: Instant::now(),
                state: self.state,
            });

        #[cfg(feature = "metrics")]
        counter!(
            "faas_circuitbreaker_calls_total",
            "function_id" => function_id.as_str().to_string(),
            "outcome" => "success"
        )
        .increment(1);
    }

    pub fn record_failure(
        &mut self,
        function_id: &FunctionId,
        config: &CircuitBreakerConfig,
        duration: std::time::Duration,
    ) {
        self.last_failure_time = Some(Instant::now());

        match self.state {
            CircuitState::HalfOpen => {
                self.half_open_in_flight = self.half_open_in_flight.saturating_sub(1);
                self.transition_to(CircuitState::Open, function_id, config);
            }
            _ => {
                self.failures += 1;
                if self.failures >= config.failure_threshold {
                    self.transition_to(CircuitState::Open, function_id, config);
                }
            }
        }

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                function_id: function_id.clone(),
                timestamp: Instant::now(),
                state: self.state,
                duration,
            });

        #[cfg(feature = "metrics")]
        counter!(
            "faas_circuitbreaker_calls_total",
            "function_id" => function_id.as_str().to_string(),
            "outcome" => "failure"
        )
        .increment(1);
    }

    pub fn reset(&mut self, function_id: &FunctionId, config: &CircuitBreakerConfig) {
        self.transition_to(CircuitState::Closed, function_id, config);
    }

    fn emit_admission(
        &self,
        function_id: &FunctionId,
        config: &CircuitBreakerConfig,
        permitted: bool,
    ) {
        let event = if permitted {
            CircuitBreakerEvent::CallPermitted {
                function_id: function_id.clone(),
                timestamp: Instant::now(),
                state: self.state,
            }
        } else {
            CircuitBreakerEvent::CallRejected {
                function_id: function_id.clone(),
                timestamp: Instant::now(),
                state: self.state,
            }
        };
        config.event_listeners.emit(&event);
    }

    fn transition_to(
        &mut self,
        state: CircuitState,
        function_id: &FunctionId,
        config: &CircuitBreakerConfig,
    ) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                function_id: function_id.clone(),
                timestamp: Instant::now(),
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(
            function_id = %function_id,
            from = ?from_state,
            to = ?state,
            "circuit breaker state transition"
        );

        #[cfg(feature = "metrics")]
        {
            let from_label = match from_state {
                CircuitState::Closed => "closed",
                CircuitState::Open => "open",
                CircuitState::HalfOpen => "half_open",
            };
            let to_label = match state {
                CircuitState::Closed => "closed",
                CircuitState::Open => "open",
                CircuitState::HalfOpen => "half_open",
            };
            counter!(
                "faas_circuitbreaker_transitions_total",
                "function_id" => function_id.as_str().to_string(),
                "from" => from_label,
                "to" => to_label
            )
            .increment(1);
            gauge!(
                "faas_circuitbreaker_state",
                "function_id" => function_id.as_str().to_string()
            )
            .set(state as u8 as f64);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.successes = 0;
        self.failures = 0;
        self.half_open_in_flight = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(failure_threshold: usize, success_threshold: usize) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            success_threshold,
            reset_timeout: Duration::from_millis(20),
            max_half_open_requests: 1,
            event_listeners: faas_core::EventListeners::new(),
        }
    }

    #[test]
    fn trips_after_consecutive_failures() {
        let fid = FunctionId::from("f1");
        let cfg = config(3, 1);
        let mut circuit = Circuit::new();

        assert!(circuit.admit(&fid, &cfg));
        circuit.record_failure(&fid, &cfg, Duration::from_millis(1));
        assert!(circuit.admit(&fid, &cfg));
        circuit.record_failure(&fid, &cfg, Duration::from_millis(1));
        assert!(circuit.admit(&fid, &cfg));
        circuit.record_failure(&fid, &cfg, Duration::from_millis(1));

        assert_eq!(circuit.state(), CircuitState::Open);
        assert!(!circuit.admit(&fid, &cfg));
    }

    #[test]
    fn success_resets_failure_count_while_closed() {
        let fid = FunctionId::from("f1");
        let cfg = config(3, 1);
        let mut circuit = Circuit::new();

        circuit.admit(&fid, &cfg);
        circuit.record_failure(&fid, &cfg, Duration::from_millis(1));
        circuit.admit(&fid, &cfg);
        circuit.record_success(&fid, &cfg);
        circuit.admit(&fid, &cfg);
        circuit.record_failure(&fid, &cfg, Duration::from_millis(1));
        circuit.admit(&fid, &cfg);
        circuit.record_failure(&fid, &cfg, Duration::from_millis(1));

        // Only 2 consecutive failures since the reset, threshold is 3.
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_after_reset_timeout_then_closes_on_success_threshold() {
        let fid = FunctionId::from("f1");
        let cfg = config(1, 2);
        let mut circuit = Circuit::new();

        circuit.admit(&fid, &cfg);
        circuit.record_failure(&fid, &cfg, Duration::from_millis(1));
        assert_eq!(circuit.state(), CircuitState::Open);
        assert!(!circuit.admit(&fid, &cfg));

        tokio::time::advance(Duration::from_millis(25)).await;

        assert!(circuit.admit(&fid, &cfg));
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        circuit.record_success(&fid, &cfg);
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        circuit.record_success(&fid, &cfg);
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens_immediately() {
        let fid = FunctionId::from("f1");
        let cfg = config(1, 2);
        let mut circuit = Circuit::new();

        circuit.admit(&fid, &cfg);
        circuit.record_failure(&fid, &cfg, Duration::from_millis(1));
        tokio::time::advance(Duration::from_millis(25)).await;
        circuit.admit(&fid, &cfg);
        assert_eq!(circuit.state(), CircuitState::HalfOpen);

        circuit.record_failure(&fid, &cfg, Duration::from_millis(1));
        assert_eq!(circuit.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_surplus_requests_rejected() {
        let fid = FunctionId::from("f1");
        let cfg = CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            reset_timeout: Duration::from_millis(0),
            max_half_open_requests: 2,
            event_listeners: faas_core::EventListeners::new(),
        };
        let mut circuit = Circuit::new();
        circuit.admit(&fid, &cfg);
        circuit.record_failure(&fid, &cfg, Duration::from_millis(1));

        assert!(circuit.admit(&fid, &cfg));
        assert!(circuit.admit(&fid, &cfg));
        assert!(!circuit.admit(&fid, &cfg));
    }

    #[test]
    fn last_failure_time_is_recorded_and_survives_transitions() {
        let fid = FunctionId::from("f1");
        let cfg = config(1, 1);
        let mut circuit = Circuit::new();

        assert!(circuit.last_failure_time().is_none());
        circuit.admit(&fid, &cfg);
        circuit.record_failure(&fid, &cfg, Duration::from_millis(1));
        assert!(circuit.last_failure_time().is_some());
    }
}
