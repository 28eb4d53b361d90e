use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use faas_core::{ExecutionId, FunctionId};
use faas_executor::{
    ExecuteRequest, ExecutionOutcome, ExecutorConfig, ExecutorStateSnapshot, FunctionExecutor,
};
use faas_loader::{ModuleCompiler, ModuleLoader, UpstreamFetcher};
use faas_metrics::MetricsRegistry;
use faas_store::{AggregateMetrics, ExecutionRecord, LogStore};

use crate::config::FaasConfig;

/// Wires the Module Loader, per-function Executor registry, Log/Metric
/// Store, and cross-function Metrics Exporter into the single object the
/// HTTP surfaces in [`crate::http`] are built over (spec.md §1's "four
/// tightly coupled subsystems").
///
/// One `loader` and one `log_store`/`metrics` registry are shared across
/// every function; a dedicated [`FunctionExecutor`] — with its own warm
/// state, queue, and execution log — is created lazily per `FunctionId` on
/// first use, matching spec.md §4.E's "distinct functions each get their
/// own executor actor".
pub struct FaasCore {
    executor_config: ExecutorConfig,
    loader: Arc<ModuleLoader>,
    executors: Mutex<HashMap<FunctionId, Arc<FunctionExecutor>>>,
    log_store: Arc<LogStore>,
    metrics: Arc<MetricsRegistry>,
}

impl FaasCore {
    pub fn new(
        config: FaasConfig,
        fetcher: Option<Arc<dyn UpstreamFetcher>>,
        compiler: Arc<dyn ModuleCompiler>,
    ) -> Self {
        let loader = Arc::new(ModuleLoader::new(config.loader, fetcher, compiler));
        Self {
            executor_config: config.executor,
            loader,
            executors: Mutex::new(HashMap::new()),
            log_store: Arc::new(LogStore::open_in_memory().expect("in-memory sqlite never fails to open")),
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn log_store(&self) -> &Arc<LogStore> {
        &self.log_store
    }

    /// Returns this function's executor, creating it on first access.
    pub fn executor_for(&self, function_id: &FunctionId) -> Arc<FunctionExecutor> {
        self.executors
            .lock()
            .entry(function_id.clone())
            .or_insert_with(|| {
                Arc::new(FunctionExecutor::new(
                    function_id.clone(),
                    self.executor_config,
                    Arc::clone(&self.loader),
                ))
            })
            .clone()
    }

    /// `execute({functionId, code, ...})`: dispatches to that function's
    /// executor and folds the outcome into the cross-function metrics
    /// registry (spec.md §4.G aggregates over every executed invocation).
    pub async fn execute(&self, function_id: FunctionId, request: ExecuteRequest) -> ExecutionOutcome {
        let executor = self.executor_for(&function_id);
        let outcome = executor.execute(request).await;
        self.record_metrics(&function_id, &outcome);
        outcome
    }

    pub fn get_state(&self, function_id: &FunctionId) -> ExecutorStateSnapshot {
        self.executor_for(function_id).get_state()
    }

    pub fn get_execution_logs(&self, function_id: &FunctionId) -> Vec<ExecutionRecord> {
        self.executor_for(function_id).get_execution_logs()
    }

    pub fn get_aggregate_metrics(&self, function_id: &FunctionId) -> AggregateMetrics {
        self.executor_for(function_id).get_aggregate_metrics()
    }

    /// `abort(executionId)`: the HTTP contract gives no `functionId`, so
    /// every currently instantiated executor is asked in turn until one
    /// recognizes the id. Returns `true` iff an active execution was found.
    pub fn abort(&self, execution_id: ExecutionId) -> bool {
        let executors: Vec<Arc<FunctionExecutor>> = self.executors.lock().values().cloned().collect();
        executors.iter().any(|executor| executor.abort(execution_id))
    }

    fn record_metrics(&self, function_id: &FunctionId, outcome: &ExecutionOutcome) {
        self.metrics.record_invocation(function_id, None);
        if !outcome.success {
            self.metrics.record_error(function_id);
        }
        if outcome.cold_start {
            self.metrics.record_cold_start(function_id);
        } else {
            self.metrics.record_warm_start(function_id);
        }
        if let Some(metrics) = &outcome.metrics {
            self.metrics
                .record_duration(function_id, metrics.duration_ms as f64 / 1000.0);
            self.metrics.record_memory(function_id, metrics.memory_used_bytes);
        }
    }
}
