use std::time::Instant;

use faas_core::{ExecutionId, FaasEvent, FunctionId};

/// Events emitted by a [`crate::FunctionExecutor`] over its lifecycle,
/// following the same listener pattern the circuit breaker and cache use,
/// generalized with the admission outcomes spec.md §4.E names.
#[derive(Debug, Clone)]
pub enum ExecutorEvent {
    Admitted {
        function_id: FunctionId,
        execution_id: ExecutionId,
        timestamp: Instant,
        cold_start: bool,
    },
    Queued {
        function_id: FunctionId,
        timestamp: Instant,
        queue_depth: usize,
    },
    QueueRejected {
        function_id: FunctionId,
        timestamp: Instant,
    },
    WentCold {
        function_id: FunctionId,
        timestamp: Instant,
    },
}

impl ExecutorEvent {
    fn function_id(&self) -> &FunctionId {
        match self {
            Self::Admitted { function_id, .. }
            | Self::Queued { function_id, .. }
            | Self::QueueRejected { function_id, .. }
            | Self::WentCold { function_id, .. } => function_id,
        }
    }
}

impl FaasEvent for ExecutorEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Admitted { .. } => "admitted",
            Self::Queued { .. } => "queued",
            Self::QueueRejected { .. } => "queue_rejected",
            Self::WentCold { .. } => "went_cold",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Admitted { timestamp, .. }
            | Self::Queued { timestamp, .. }
            | Self::QueueRejected { timestamp, .. }
            | Self::WentCold { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        self.function_id().as_str()
    }
}
