use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use faas_core::{EventListeners, ExecutionId, FunctionId};
use faas_loader::{LoadFunctionRequest, ModuleLoader};
use faas_sandbox::{SandboxConfig, SandboxInput, SandboxRequest, SandboxRunner};
use faas_store::{ExecutionStore, Settlement};

use crate::config::ExecutorConfig;
use crate::error::ExecutorError;
use crate::events::ExecutorEvent;
use crate::outcome::{ErrorInfo, ExecutionMetrics, ExecutionOutcome, ExecutorStateSnapshot};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// `execute({functionId, code, request, timeoutMs?, signal?})` input, per
/// spec.md §4.E. `signal` is represented as an externally supplied
/// [`CancellationToken`] rather than a callback, the composition-over-
/// closures translation spec.md §9 describes.
pub struct ExecuteRequest {
    pub code: String,
    pub tests: Option<String>,
    pub script: Option<String>,
    pub request: SandboxRequest,
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl ExecuteRequest {
    pub fn new(code: impl Into<String>, request: SandboxRequest) -> Self {
        Self {
            code: code.into(),
            tests: None,
            script: None,
            request,
            timeout: None,
            cancel: None,
        }
    }
}

struct WarmState {
    is_warm: bool,
    last_execution_time: Option<Instant>,
    last_execution_time_ms: Option<u64>,
    loaded_functions: HashSet<FunctionId>,
}

impl WarmState {
    fn new() -> Self {
        Self {
            is_warm: false,
            last_execution_time: None,
            last_execution_time_ms: None,
            loaded_functions: HashSet::new(),
        }
    }
}

/// Per-`FunctionId` executor actor (spec.md §4.E): owns the request queue,
/// active-execution set, warm/cold lifecycle, execution-log store, and
/// aggregate counters for exactly one function. Distinct functions each get
/// their own `FunctionExecutor` and run fully in parallel (spec.md §5).
pub struct FunctionExecutor {
    function_id: FunctionId,
    config: ExecutorConfig,
    loader: Arc<ModuleLoader>,
    runner: SandboxRunner,
    store: ExecutionStore,
    semaphore: Arc<Semaphore>,
    queued: AtomicUsize,
    active: Mutex<HashMap<ExecutionId, CancellationToken>>,
    state: Mutex<WarmState>,
    event_listeners: EventListeners<ExecutorEvent>,
}

impl FunctionExecutor {
    pub fn new(function_id: FunctionId, config: ExecutorConfig, loader: Arc<ModuleLoader>) -> Self {
        Self::with_listeners(function_id, config, loader, EventListeners::new())
    }

    pub fn with_listeners(
        function_id: FunctionId,
        config: ExecutorConfig,
        loader: Arc<ModuleLoader>,
        event_listeners: EventListeners<ExecutorEvent>,
    ) -> Self {
        Self {
            function_id,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_executions)),
            runner: SandboxRunner::new(SandboxConfig {
                max_console_entries: config.max_console_output_size,
                default_timeout: config.execution_timeout,
            }),
            store: ExecutionStore::open_in_memory().expect("in-memory sqlite never fails to open"),
            config,
            loader,
            queued: AtomicUsize::new(0),
            active: Mutex::new(HashMap::new()),
            state: Mutex::new(WarmState::new()),
            event_listeners,
        }
    }

    pub fn function_id(&self) -> &FunctionId {
        &self.function_id
    }

    /// `execute(...)` per spec.md §4.E's six-step protocol. `QueueFull` is
    /// the one admission failure returned as an unsuccessful
    /// [`ExecutionOutcome`] rather than propagated further (spec.md §7).
    pub async fn execute(&self, request: ExecuteRequest) -> ExecutionOutcome {
        let permit = match self.admit().await {
            Ok(permit) => permit,
            Err(ExecutorError::QueueFull) => {
                self.event_listeners.emit(&ExecutorEvent::QueueRejected {
                    function_id: self.function_id.clone(),
                    timestamp: Instant::now(),
                });
                return ExecutionOutcome::queue_full();
            }
        };

        let cold_start = {
            let mut state = self.state.lock();
            let cold_start = !state.loaded_functions.contains(&self.function_id);
            state.loaded_functions.insert(self.function_id.clone());
            cold_start
        };

        let execution_id = ExecutionId::new();
        let cancel = request.cancel.unwrap_or_default();
        {
            let mut active = self.active.lock();
            active.insert(execution_id, cancel.clone());
        }

        self.event_listeners.emit(&ExecutorEvent::Admitted {
            function_id: self.function_id.clone(),
            execution_id,
            timestamp: Instant::now(),
            cold_start,
        });

        let start_time_ms = now_ms();
        let start_instant = Instant::now();
        let _ = self.store.start(execution_id, &self.function_id, start_time_ms);

        let load_result = self
            .loader
            .load_function(LoadFunctionRequest {
                id: self.function_id.clone(),
                code: request.code,
                tests: request.tests,
                script: request.script,
            })
            .await;

        let outcome = match load_result.stub {
            Some(stub) => {
                let mut input = SandboxInput::new(stub.module, request.request);
                input.cancel = Some(cancel.clone());
                input.timeout = request.timeout;
                let result = self.runner.run(input).await;

                let end_time_ms = now_ms();
                let duration_ms = start_instant.elapsed().as_millis() as u64;
                let (console, truncated) = cap_console(result.console, self.config.max_console_output_size);

                let metrics = ExecutionMetrics {
                    duration_ms,
                    cpu_time_ms: duration_ms,
                    memory_used_bytes: 0,
                    start_time_ms,
                    end_time_ms,
                    timed_out: result.timed_out,
                    aborted: result.aborted,
                };

                let settlement = Settlement {
                    end_time_ms,
                    duration_ms,
                    success: result.success,
                    error: result.error.clone(),
                    memory_bytes: Some(metrics.memory_used_bytes),
                    console: console.clone(),
                    metrics: serde_json::to_value(&metrics).ok(),
                };
                let _ = self.store.settle(execution_id, settlement);

                ExecutionOutcome {
                    execution_id,
                    success: result.success,
                    cold_start,
                    timed_out: result.timed_out,
                    aborted: result.aborted,
                    queued: false,
                    metrics: Some(metrics),
                    console_output: console,
                    console_output_truncated: truncated,
                    error: result.error.map(ErrorInfo::new),
                }
            }
            None => {
                let end_time_ms = now_ms();
                let duration_ms = start_instant.elapsed().as_millis() as u64;
                let error = load_result.error.unwrap_or_else(|| "load failed".to_string());

                let settlement = Settlement {
                    end_time_ms,
                    duration_ms,
                    success: false,
                    error: Some(error.clone()),
                    memory_bytes: Some(0),
                    console: Vec::new(),
                    metrics: None,
                };
                let _ = self.store.settle(execution_id, settlement);

                ExecutionOutcome {
                    execution_id,
                    success: false,
                    cold_start,
                    timed_out: false,
                    aborted: false,
                    queued: false,
                    metrics: None,
                    console_output: Vec::new(),
                    console_output_truncated: false,
                    error: Some(ErrorInfo::new(error)),
                }
            }
        };

        {
            let mut active = self.active.lock();
            active.remove(&execution_id);
        }
        if outcome.success {
            let mut state = self.state.lock();
            state.is_warm = true;
            state.last_execution_time = Some(Instant::now());
            state.last_execution_time_ms = Some(now_ms());
        }
        drop(permit);

        outcome
    }

    async fn admit(&self) -> Result<tokio::sync::OwnedSemaphorePermit, ExecutorError> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(permit),
            Err(_) => {
                let queued_now = self.queued.fetch_add(1, Ordering::SeqCst) + 1;
                if queued_now > self.config.max_queue_size {
                    self.queued.fetch_sub(1, Ordering::SeqCst);
                    return Err(ExecutorError::QueueFull);
                }
                self.event_listeners.emit(&ExecutorEvent::Queued {
                    function_id: self.function_id.clone(),
                    timestamp: Instant::now(),
                    queue_depth: queued_now,
                });
                let permit = Arc::clone(&self.semaphore)
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                self.queued.fetch_sub(1, Ordering::SeqCst);
                Ok(permit)
            }
        }
    }

    /// `getState()` (spec.md §4.E).
    pub fn get_state(&self) -> ExecutorStateSnapshot {
        let state = self.state.lock();
        let active = self.active.lock();
        ExecutorStateSnapshot {
            is_warm: state.is_warm,
            last_execution_time_ms: state.last_execution_time_ms,
            loaded_functions: state.loaded_functions.iter().cloned().collect(),
            active_executions: active.len(),
            active_execution_ids: active.keys().copied().collect(),
        }
    }

    /// `getExecutionLog(executionId)`.
    pub fn get_execution_log(
        &self,
        execution_id: ExecutionId,
    ) -> Option<faas_store::ExecutionRecord> {
        self.store.get(execution_id).ok().flatten()
    }

    /// `getExecutionLogs(functionId)`: timestamp-descending, scoped to this
    /// executor's own function since one actor owns exactly one function.
    pub fn get_execution_logs(&self) -> Vec<faas_store::ExecutionRecord> {
        self.store
            .list_for_function(&self.function_id)
            .unwrap_or_default()
    }

    /// `getAggregateMetrics(functionId)`.
    pub fn get_aggregate_metrics(&self) -> faas_store::AggregateMetrics {
        self.store
            .aggregate_metrics(&self.function_id)
            .unwrap_or_default()
    }

    /// `abort(executionId)`: signals the invocation's cancellation token if
    /// it is still active. Returns `true` iff an active execution was found.
    pub fn abort(&self, execution_id: ExecutionId) -> bool {
        let active = self.active.lock();
        match active.get(&execution_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// `cleanupOldLogs()`: trims execution rows older than
    /// `logRetentionMs` (spec.md §4.E step 6, piggybacking on the idle
    /// alarm's tick in production, invoked directly here for testability).
    pub fn cleanup_old_logs(&self) -> usize {
        self.store
            .trim_retention(now_ms(), self.config.log_retention.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Idle-alarm tick (spec.md §4.E step 6): if the executor is warm and
    /// has been idle for at least `warmIdleTimeoutMs`, transitions to cold
    /// and clears `loadedFunctions`. Also sweeps retention. Exposed as a
    /// plain method (rather than only a spawned background task) so callers
    /// — including tests driving `tokio::time::pause`/`advance` — can
    /// trigger the alarm deterministically.
    pub fn run_idle_sweep(&self) {
        let went_cold = {
            let mut state = self.state.lock();
            match state.last_execution_time {
                Some(last) if state.is_warm && last.elapsed() >= self.config.warm_idle_timeout => {
                    state.is_warm = false;
                    state.loaded_functions.clear();
                    true
                }
                _ => false,
            }
        };

        if went_cold {
            self.event_listeners.emit(&ExecutorEvent::WentCold {
                function_id: self.function_id.clone(),
                timestamp: Instant::now(),
            });
        }

        self.cleanup_old_logs();
    }

    /// Spawns a background task that periodically calls [`Self::
    /// run_idle_sweep`] until `cancel` fires, the production path for the
    /// idle-cleanup alarm (spec.md §9 "Timers and alarms").
    pub fn spawn_idle_reaper(
        self: &Arc<Self>,
        tick: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let executor = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => executor.run_idle_sweep(),
                }
            }
        })
    }
}

fn cap_console(
    console: Vec<faas_sandbox::ConsoleEntry>,
    max: usize,
) -> (Vec<serde_json::Value>, bool) {
    let truncated = console.len() > max;
    let capped = console
        .into_iter()
        .take(max)
        .map(|entry| serde_json::to_value(entry).unwrap_or(serde_json::Value::Null))
        .collect();
    (capped, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use faas_loader::{LoaderConfig, StaticRegistryCompiler};
    use faas_sandbox::{BoxedHandler, Module, SandboxResponse};

    fn ok_handler() -> BoxedHandler {
        Arc::new(|_req, ctx| {
            Box::pin(async move {
                ctx.console.log("hello");
                SandboxResponse::with_status(200)
            })
        })
    }

    fn loader_with(code: &str, module: Module) -> Arc<ModuleLoader> {
        let compiler = StaticRegistryCompiler::new();
        compiler.register(code, module);
        Arc::new(ModuleLoader::new(
            LoaderConfig::default(),
            None,
            Arc::new(compiler),
        ))
    }

    fn executor(config: ExecutorConfig, code: &str) -> FunctionExecutor {
        let loader = loader_with(code, Module::new(Some(ok_handler())));
        FunctionExecutor::new(FunctionId::from("A"), config, loader)
    }

    #[tokio::test(start_paused = true)]
    async fn cold_then_warm_then_cold_after_idle() {
        let code = "export default {fetch:async()=>new Response('ok')}";
        let exec = executor(
            ExecutorConfig {
                warm_idle_timeout: Duration::from_millis(20),
                ..ExecutorConfig::default()
            },
            code,
        );

        let first = exec
            .execute(ExecuteRequest::new(code, SandboxRequest::default()))
            .await;
        assert!(first.success);
        assert!(first.cold_start);

        let second = exec
            .execute(ExecuteRequest::new(code, SandboxRequest::default()))
            .await;
        assert!(!second.cold_start);

        tokio::time::advance(Duration::from_millis(30)).await;
        exec.run_idle_sweep();
        assert!(!exec.get_state().is_warm);

        let third = exec
            .execute(ExecuteRequest::new(code, SandboxRequest::default()))
            .await;
        assert!(third.cold_start);
    }

    #[tokio::test]
    async fn queue_full_is_unsuccessful_not_an_exception() {
        let code = "slow";
        let handler: BoxedHandler = Arc::new(|_req, _ctx| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                SandboxResponse::with_status(200)
            })
        });
        let loader = loader_with(code, Module::new(Some(handler)));
        let exec = Arc::new(FunctionExecutor::new(
            FunctionId::from("A"),
            ExecutorConfig {
                max_concurrent_executions: 1,
                max_queue_size: 1,
                ..ExecutorConfig::default()
            },
            loader,
        ));

        let e1 = Arc::clone(&exec);
        let running = tokio::spawn(async move {
            e1.execute(ExecuteRequest::new(code, SandboxRequest::default())).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let e2 = Arc::clone(&exec);
        let queued = tokio::spawn(async move {
            e2.execute(ExecuteRequest::new(code, SandboxRequest::default())).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let rejected = exec
            .execute(ExecuteRequest::new(code, SandboxRequest::default()))
            .await;
        assert!(!rejected.success);
        assert!(rejected.error.unwrap().message.contains("queue"));

        running.await.unwrap();
        queued.await.unwrap();
    }

    #[tokio::test]
    async fn abort_cancels_in_flight_execution() {
        let code = "slow";
        let handler: BoxedHandler = Arc::new(|_req, ctx| {
            ctx.console.log("started");
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                SandboxResponse::with_status(200)
            })
        });
        let loader = loader_with(code, Module::new(Some(handler)));
        let exec = Arc::new(FunctionExecutor::new(
            FunctionId::from("A"),
            ExecutorConfig::default(),
            loader,
        ));

        let exec2 = Arc::clone(&exec);
        let run = tokio::spawn(async move {
            exec2
                .execute(ExecuteRequest::new(code, SandboxRequest::default()))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        let active = exec.get_state().active_execution_ids;
        assert_eq!(active.len(), 1);
        assert!(exec.abort(active[0]));

        let outcome = run.await.unwrap();
        assert!(outcome.aborted);
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn execution_log_round_trips_through_store() {
        let code = "export default {fetch:async()=>new Response('ok')}";
        let exec = executor(ExecutorConfig::default(), code);
        let outcome = exec
            .execute(ExecuteRequest::new(code, SandboxRequest::default()))
            .await;

        let row = exec.get_execution_log(outcome.execution_id).unwrap();
        assert!(row.success);
        assert!(row.end_time_ms.unwrap() >= row.start_time_ms);

        let logs = exec.get_execution_logs();
        assert_eq!(logs.len(), 1);

        let metrics = exec.get_aggregate_metrics();
        assert_eq!(metrics.total, 1);
        assert_eq!(metrics.successful, 1);
    }
}
