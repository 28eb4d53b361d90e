use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::console::ConsoleEntry;
use crate::context::SandboxContext;
use crate::module::{Module, TestRegistry};
use crate::types::{SandboxRequest, SandboxResponse, TestSummary};

#[derive(Clone, Copy)]
pub struct SandboxConfig {
    pub max_console_entries: usize,
    pub default_timeout: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_console_entries: 1000,
            default_timeout: Duration::from_secs(10),
        }
    }
}

pub struct SandboxInput {
    pub module: Module,
    pub request: SandboxRequest,
    pub timeout: Option<Duration>,
    pub block_network: bool,
    pub cancel: Option<CancellationToken>,
}

impl SandboxInput {
    pub fn new(module: Module, request: SandboxRequest) -> Self {
        Self {
            module,
            request,
            timeout: None,
            block_network: false,
            cancel: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub timed_out: bool,
    pub aborted: bool,
    pub error: Option<String>,
    pub response: Option<SandboxResponse>,
    pub console: Vec<ConsoleEntry>,
    pub duration_ms: u64,
    pub tests: Option<TestSummary>,
    pub script_result: Option<serde_json::Value>,
}

/// Executes sandboxed invocations per spec.md §4.D's 8-step protocol. Each
/// `run` is a single invocation over a fresh [`SandboxContext`]: globals
/// (here, the console buffer and network capability) set up for one call
/// are never shared with the next.
pub struct SandboxRunner {
    config: SandboxConfig,
}

enum Outcome {
    Ran {
        response: Option<SandboxResponse>,
        tests: Option<TestSummary>,
        script_result: Option<serde_json::Value>,
        error: Option<String>,
    },
    Aborted,
}

impl SandboxRunner {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, input: SandboxInput) -> ExecutionResult {
        let start = Instant::now();
        let ctx = SandboxContext::new(self.config.max_console_entries, input.block_network);
        let timeout = input.timeout.unwrap_or(self.config.default_timeout);
        let cancel = input.cancel.clone().unwrap_or_default();

        let work = Self::do_work(input.module, input.request, ctx.clone());

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Outcome::Aborted,
            result = tokio::time::timeout(timeout, work) => match result {
                Ok(outcome) => outcome,
                Err(_elapsed) => {
                    return ExecutionResult {
                        success: false,
                        timed_out: true,
                        error: Some("Execution timeout exceeded".to_string()),
                        console: ctx.console.drain(),
                        duration_ms: start.elapsed().as_millis() as u64,
                        ..Default::default()
                    };
                }
            },
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let console = ctx.console.drain();

        match outcome {
            Outcome::Aborted => ExecutionResult {
                success: false,
                aborted: true,
                console,
                duration_ms,
                ..Default::default()
            },
            Outcome::Ran {
                response,
                tests,
                script_result,
                error,
            } => {
                let test_failed = tests.as_ref().map(|t| t.failed > 0).unwrap_or(false);
                let script_errored = error.is_some();
                ExecutionResult {
                    success: !test_failed && !script_errored,
                    error,
                    response,
                    console,
                    duration_ms,
                    tests,
                    script_result,
                    ..Default::default()
                }
            }
        }
    }

    /// Steps 1, 7 and 8: module init, tests subrun (if present), script
    /// subrun (if present). Tests always run before script when both are
    /// present. With neither present, the module's `fetch` handler is
    /// invoked against `request` directly.
    async fn do_work(module: Module, request: SandboxRequest, ctx: SandboxContext) -> Outcome {
        let tests = module.tests.as_ref().map(|registrar| {
            let mut registry = TestRegistry::new();
            registrar(&mut registry);
            registry.run()
        });

        if let Some(script) = &module.script {
            let script_result = script(module.fetch.clone(), ctx.clone()).await;
            return match script_result {
                Ok(value) => Outcome::Ran {
                    response: None,
                    tests,
                    script_result: Some(value),
                    error: None,
                },
                Err(message) => Outcome::Ran {
                    response: None,
                    tests,
                    script_result: None,
                    error: Some(message),
                },
            };
        }

        if tests.is_some() {
            return Outcome::Ran {
                response: None,
                tests,
                script_result: None,
                error: None,
            };
        }

        match &module.fetch {
            Some(handler) => {
                let response = handler(request, ctx).await;
                Outcome::Ran {
                    response: Some(response),
                    tests,
                    script_result: None,
                    error: None,
                }
            }
            None => Outcome::Ran {
                response: Some(SandboxResponse::with_status(500)),
                tests,
                script_result: None,
                error: Some("module exposes no fetch handler".to_string()),
            },
        }
    }
}
