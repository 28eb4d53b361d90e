use std::time::{Duration, Instant};

use faas_core::{FunctionId, FaasEvent};

use crate::circuit::CircuitState;

/// Events emitted by a function's circuit breaker on every state change or
/// admission decision.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    StateTransition {
        function_id: FunctionId,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    CallPermitted {
        function_id: FunctionId,
        timestamp: Instant,
        state: CircuitState,
    },
    CallRejected {
        function_id: FunctionId,
        timestamp: Instant,
        state: CircuitState,
    },
    SuccessRecorded {
        function_id: FunctionId,
        timestamp: Instant,
        state: CircuitState,
    },
    FailureRecorded {
        function_id: FunctionId,
        timestamp: Instant,
        state: CircuitState,
        duration: Duration,
    },
}

impl CircuitBreakerEvent {
    fn function_id(&self) -> &FunctionId {
        match self {
            Self::StateTransition { function_id, .. }
            | Self::CallPermitted { function_id, .. }
            | Self::CallRejected { function_id, .. }
            | Self::SuccessRecorded { function_id, .. }
            | Self::FailureRecorded { function_id, .. } => function_id,
        }
    }
}

impl FaasEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::StateTransition { .. } => "state_transition",
            Self::CallPermitted { .. } => "call_permitted",
            Self::CallRejected { .. } => "call_rejected",
            Self::SuccessRecorded { .. } => "success_recorded",
            Self::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::StateTransition { timestamp, .. }
            | Self::CallPermitted { timestamp, .. }
            | Self::CallRejected { timestamp, .. }
            | Self::SuccessRecorded { timestamp, .. }
            | Self::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        self.function_id().as_str()
    }
}
