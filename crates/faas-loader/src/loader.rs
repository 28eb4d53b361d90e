use std::sync::Arc;
use std::time::Instant;

use faas_cache::{Cache, CacheConfig, CacheError};
use faas_circuitbreaker::CircuitBreakerRegistry;
use faas_core::{CodeHash, FunctionId};

use crate::compiler::{FunctionSource, ModuleCompiler};
use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::fetcher::UpstreamFetcher;
use crate::stub::{LoadResult, ModuleStub};

/// Request shape for the full load+validate path (spec.md §4.C
/// `loadFunction`).
pub struct LoadFunctionRequest {
    pub id: FunctionId,
    pub code: String,
    pub tests: Option<String>,
    pub script: Option<String>,
}

/// Orchestrates [`faas_cache::Cache`] + [`CircuitBreakerRegistry`] + an
/// [`UpstreamFetcher`]/[`ModuleCompiler`] pair to implement spec.md §4.C's
/// public contract.
pub struct ModuleLoader {
    cache: Cache<ModuleStub, LoaderError>,
    breaker: CircuitBreakerRegistry,
    fetcher: Option<Arc<dyn UpstreamFetcher>>,
    compiler: Arc<dyn ModuleCompiler>,
    timeout: std::time::Duration,
}

impl ModuleLoader {
    pub fn new(
        config: LoaderConfig,
        fetcher: Option<Arc<dyn UpstreamFetcher>>,
        compiler: Arc<dyn ModuleCompiler>,
    ) -> Self {
        let timeout = config.timeout;
        Self {
            cache: Cache::new(CacheConfig {
                max_cache_size: config.max_cache_size,
                ttl: config.cache_ttl,
            }),
            breaker: CircuitBreakerRegistry::new(config.circuit_breaker),
            fetcher,
            compiler,
            timeout,
        }
    }

    pub fn cache_stats(&self) -> faas_cache::CacheStats {
        self.cache.stats()
    }

    pub fn breaker_state(&self, function_id: &FunctionId) -> faas_circuitbreaker::CircuitState {
        self.breaker.get_state(function_id)
    }

    pub fn invalidate(&self, function_id: &FunctionId) {
        self.cache.invalidate(function_id);
    }

    /// `get(functionId) -> Stub` (spec.md §4.C): cache-backed retrieval
    /// using the configured upstream fetcher.
    pub async fn get(&self, function_id: &FunctionId) -> Result<ModuleStub, LoaderError> {
        let result = self
            .cache
            .get(function_id, || self.load_via_upstream(function_id))
            .await;
        Self::unwrap_cache_result(result)
    }

    /// `loadFunction({id, code, tests?, script?, opts}) -> LoadResult`
    /// (spec.md §4.C): full load+validate path given code directly, with
    /// dedup against the cache's `codeHash -> FunctionId` index.
    pub async fn load_function(&self, request: LoadFunctionRequest) -> LoadResult {
        let code_hash = CodeHash::digest(
            &request.code,
            request.tests.as_deref(),
            request.script.as_deref(),
        );
        let source = FunctionSource {
            code: request.code,
            tests: request.tests,
            script: request.script,
        };
        let id = request.id;

        let result = self
            .cache
            .load_function(&id, code_hash, || self.compile_local(id.clone(), source))
            .await;

        match Self::unwrap_cache_result(result) {
            Ok(stub) => match &stub.compile_error {
                Some(details) => LoadResult::failed_with_stub(
                    format!("CompilationError: {details}"),
                    stub,
                ),
                None => LoadResult::ok(stub),
            },
            Err(err) => LoadResult::failed(err.to_string()),
        }
    }

    /// Leader-path load backing `get`: checks breaker admission, then calls
    /// the upstream fetcher and compiler, reporting the outcome to the
    /// breaker (spec.md §4.B "the failure is also reported to the
    /// breaker").
    async fn load_via_upstream(&self, function_id: &FunctionId) -> Result<ModuleStub, LoaderError> {
        self.breaker.admit(function_id).map_err(|open| {
            LoaderError::CircuitBreakerOpen {
                failures: open.failures,
                last_failure_time: open.last_failure_time,
            }
        })?;

        let Some(fetcher) = self.fetcher.as_ref() else {
            return Err(LoaderError::NoLoaderConfigured);
        };

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, fetcher.fetch_function(function_id)).await;

        let source = match outcome {
            Ok(Ok(source)) => source,
            Ok(Err(err)) => {
                self.breaker.record_failure(function_id, start.elapsed());
                return Err(err);
            }
            Err(_elapsed) => {
                let err = LoaderError::LoadTimeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                };
                self.breaker.record_failure(function_id, start.elapsed());
                return Err(err);
            }
        };

        let code_hash =
            CodeHash::digest(&source.code, source.tests.as_deref(), source.script.as_deref());

        match self.compiler.compile(&source) {
            Ok(module) => {
                self.breaker.record_success(function_id);
                Ok(ModuleStub::new(function_id.clone(), code_hash, module))
            }
            Err(LoaderError::CompilationError { details }) => {
                // A compilation error reflects the function's own code, not
                // upstream health, so it is not attributed to the breaker.
                // The resulting stub is cached like any other so repeat
                // invocations 500 without recompiling (spec.md §4.D).
                Ok(ModuleStub::compile_failed(function_id.clone(), code_hash, details))
            }
            Err(err) => Err(err),
        }
    }

    /// `loadFunction`'s local compile path: no upstream fetch or breaker
    /// involvement, since source is supplied directly by the caller.
    async fn compile_local(
        &self,
        function_id: FunctionId,
        source: FunctionSource,
    ) -> Result<ModuleStub, LoaderError> {
        let code_hash =
            CodeHash::digest(&source.code, source.tests.as_deref(), source.script.as_deref());
        match self.compiler.compile(&source) {
            Ok(module) => Ok(ModuleStub::new(function_id, code_hash, module)),
            Err(LoaderError::CompilationError { details }) => {
                Ok(ModuleStub::compile_failed(function_id, code_hash, details))
            }
            Err(err) => Err(err),
        }
    }

    fn unwrap_cache_result(
        result: Result<ModuleStub, CacheError<LoaderError>>,
    ) -> Result<ModuleStub, LoaderError> {
        result.map_err(|err| match err {
            CacheError::Load(inner) => inner,
            CacheError::LoadCancelled => {
                LoaderError::LoadError("coalesced load was cancelled".to_string())
            }
            CacheError::RecvLagged => {
                LoaderError::LoadError("failed to receive coalesced load result".to_string())
            }
        })
    }
}
