use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use faas_core::FunctionId;

use crate::circuit::{Circuit, CircuitState};
use crate::config::CircuitBreakerConfig;
use crate::error::CircuitBreakerOpen;

/// Owns one [`Circuit`] per `FunctionId`, created lazily on first use and
/// never torn down implicitly (spec.md §3: "survives process lifetime").
///
/// A plain `parking_lot::Mutex<HashMap<K, _>>` is enough here: breaker state
/// transitions are brief and uncontended compared to the work they guard.
pub struct CircuitBreakerRegistry {
    circuits: Mutex<HashMap<FunctionId, Circuit>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// `admit(functionId) -> {ok, rejected}` per spec.md §4.A.
    pub fn admit(&self, function_id: &FunctionId) -> Result<(), CircuitBreakerOpen> {
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(function_id.clone()).or_insert_with(Circuit::new);
        if circuit.admit(function_id, &self.config) {
            Ok(())
        } else {
            Err(CircuitBreakerOpen {
                failures: circuit.failure_count(),
                last_failure_time: circuit.last_failure_time(),
            })
        }
    }

    pub fn record_success(&self, function_id: &FunctionId) {
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(function_id.clone()).or_insert_with(Circuit::new);
        circuit.record_success(function_id, &self.config);
    }

    pub fn record_failure(&self, function_id: &FunctionId, duration: Duration) {
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(function_id.clone()).or_insert_with(Circuit::new);
        circuit.record_failure(function_id, &self.config, duration);
    }

    pub fn get_state(&self, function_id: &FunctionId) -> CircuitState {
        let circuits = self.circuits.lock();
        circuits
            .get(function_id)
            .map(|c| c.state())
            .unwrap_or(CircuitState::Closed)
    }

    pub fn reset(&self, function_id: &FunctionId) {
        let mut circuits = self.circuits.lock();
        let circuit = circuits.entry(function_id.clone()).or_insert_with(Circuit::new);
        circuit.reset(function_id, &self.config);
    }

    pub fn last_failure_time(&self, function_id: &FunctionId) -> Option<Instant> {
        self.circuits
            .lock()
            .get(function_id)
            .and_then(|c| c.last_failure_time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn registry(failure_threshold: usize) -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold,
            success_threshold: 1,
            reset_timeout: Duration::from_millis(20),
            max_half_open_requests: 1,
            event_listeners: faas_core::EventListeners::new(),
        })
    }

    #[test]
    fn distinct_functions_have_independent_circuits() {
        let reg = registry(1);
        let a = FunctionId::from("a");
        let b = FunctionId::from("b");

        reg.admit(&a).unwrap();
        reg.record_failure(&a, Duration::from_millis(1));
        assert_eq!(reg.get_state(&a), CircuitState::Open);
        assert_eq!(reg.get_state(&b), CircuitState::Closed);
        assert!(reg.admit(&b).is_ok());
    }

    #[test]
    fn unseen_function_starts_closed() {
        let reg = registry(3);
        let fid = FunctionId::from("new");
        assert_eq!(reg.get_state(&fid), CircuitState::Closed);
    }

    #[test]
    fn reset_clears_open_circuit() {
        let reg = registry(1);
        let fid = FunctionId::from("a");
        reg.admit(&fid).unwrap();
        reg.record_failure(&fid, Duration::from_millis(1));
        assert_eq!(reg.get_state(&fid), CircuitState::Open);

        reg.reset(&fid);
        assert_eq!(reg.get_state(&fid), CircuitState::Closed);
        assert!(reg.admit(&fid).is_ok());
    }
}
