use serde::{Deserialize, Serialize};

use faas_core::{ExecutionId, FunctionId};

/// `{message}` wrapper spec.md's `ExecutionResult` JSON shape nests user
/// errors under, per spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub message: String,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `{durationMs, cpuTimeMs, memoryUsedBytes, startTime, endTime, timedOut?,
/// aborted?}` from spec.md §3 "Execution Metrics".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetrics {
    pub duration_ms: u64,
    pub cpu_time_ms: u64,
    pub memory_used_bytes: u64,
    #[serde(rename = "startTime")]
    pub start_time_ms: u64,
    #[serde(rename = "endTime")]
    pub end_time_ms: u64,
    pub timed_out: bool,
    pub aborted: bool,
}

/// `ExecutionResult` JSON shape from spec.md §6:
/// `{executionId, success, coldStart, timedOut, aborted, queued?, metrics?,
/// consoleOutput?, consoleOutputTruncated?, error?{message}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub execution_id: ExecutionId,
    pub success: bool,
    pub cold_start: bool,
    pub timed_out: bool,
    pub aborted: bool,
    pub queued: bool,
    pub metrics: Option<ExecutionMetrics>,
    pub console_output: Vec<serde_json::Value>,
    pub console_output_truncated: bool,
    pub error: Option<ErrorInfo>,
}

impl ExecutionOutcome {
    /// Builds the spec.md §4.E "QueueFull" response: not admitted, so no
    /// real `executionId` was ever assigned to storage, but the response
    /// shape still needs one and `error.message` must contain "queue".
    pub fn queue_full() -> Self {
        Self {
            execution_id: ExecutionId::new(),
            success: false,
            cold_start: false,
            timed_out: false,
            aborted: false,
            queued: false,
            metrics: None,
            console_output: Vec::new(),
            console_output_truncated: false,
            error: Some(ErrorInfo::new("request rejected: queue is full")),
        }
    }
}

/// `ExecutorState` from spec.md §3, read via `getState()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorStateSnapshot {
    pub is_warm: bool,
    #[serde(rename = "lastExecutionTime")]
    pub last_execution_time_ms: Option<u64>,
    pub loaded_functions: Vec<FunctionId>,
    pub active_executions: usize,
    pub active_execution_ids: Vec<ExecutionId>,
}
