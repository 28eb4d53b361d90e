use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use crate::context::SandboxContext;
use crate::expect::TestFailure;
use crate::types::{SandboxRequest, SandboxResponse, TestCaseResult, TestSummary};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Stands in for "evaluate `code` and look for a `fetch(Request) -> Response`
/// handler on its default export" — the module's code is represented
/// directly as a registered Rust closure rather than source text to be
/// interpreted, since there is no embedded script engine.
pub type BoxedHandler = Arc<
    dyn Fn(SandboxRequest, SandboxContext) -> BoxFuture<'static, SandboxResponse> + Send + Sync,
>;

/// A single registered test case body. Failure is communicated by returning
/// `Err`; a Rust panic inside the body is also caught and reported as a
/// failure by the runner (mirroring an uncaught exception in an interpreted
/// harness).
pub type TestBody = Arc<dyn Fn() -> Result<(), TestFailure> + Send + Sync>;

/// `tests` input: registers `describe`/`it` blocks against a [`TestRegistry`].
pub type TestRegistrar = Arc<dyn Fn(&mut TestRegistry) + Send + Sync>;

/// `script` input: an async IIFE with the module's exports (its fetch
/// handler, if any) injected into scope.
pub type ScriptBody = Arc<
    dyn Fn(Option<BoxedHandler>, SandboxContext) -> BoxFuture<'static, Result<serde_json::Value, String>>
        + Send
        + Sync,
>;

#[derive(Clone)]
struct RegisteredCase {
    full_name: String,
    body: TestBody,
}

/// Accumulates `describe`/`it` registrations, matching the minimal harness
/// shape spec.md §4.D step 7 describes.
#[derive(Default, Clone)]
pub struct TestRegistry {
    prefix: Vec<String>,
    cases: Vec<RegisteredCase>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn describe(&mut self, name: impl Into<String>, body: impl FnOnce(&mut TestRegistry)) {
        self.prefix.push(name.into());
        body(self);
        self.prefix.pop();
    }

    pub fn it(&mut self, name: impl Into<String>, body: impl Fn() -> Result<(), TestFailure> + Send + Sync + 'static) {
        let mut parts = self.prefix.clone();
        parts.push(name.into());
        self.cases.push(RegisteredCase {
            full_name: parts.join(" > "),
            body: Arc::new(body),
        });
    }

    /// Runs every registered case, aggregating pass/fail counts and
    /// per-case timing, per spec.md §4.D step 7's `{total, passed, failed,
    /// tests[]}` shape.
    pub fn run(&self) -> TestSummary {
        let mut summary = TestSummary::default();
        for case in &self.cases {
            let start = Instant::now();
            let body = Arc::clone(&case.body);
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| body()));
            let duration_ms = start.elapsed().as_millis() as u64;

            let (passed, error) = match outcome {
                Ok(Ok(())) => (true, None),
                Ok(Err(failure)) => (false, Some(failure.0)),
                Err(panic) => (false, Some(describe_panic(panic))),
            };

            if passed {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            summary.total += 1;
            summary.tests.push(TestCaseResult {
                name: case.full_name.clone(),
                passed,
                error,
                duration_ms,
            });
        }
        summary
    }
}

fn describe_panic(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "test panicked".to_string()
    }
}

/// A module's evaluated exports: the capability set spec.md §3 describes for
/// a Module Stub (here, just the `fetch` handler — `scheduled`/`queue`/
/// `connect` reuse the same `SandboxRequest`/`SandboxResponse` shape and are
/// invoked through the same handler by convention of the request's method).
#[derive(Clone)]
pub struct Module {
    pub fetch: Option<BoxedHandler>,
    pub tests: Option<TestRegistrar>,
    pub script: Option<ScriptBody>,
}

impl Module {
    pub fn new(fetch: Option<BoxedHandler>) -> Self {
        Self {
            fetch,
            tests: None,
            script: None,
        }
    }

    pub fn with_tests(mut self, tests: TestRegistrar) -> Self {
        self.tests = Some(tests);
        self
    }

    pub fn with_script(mut self, script: ScriptBody) -> Self {
        self.script = Some(script);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_aggregates_pass_and_fail() {
        let mut registry = TestRegistry::new();
        registry.describe("math", |d| {
            d.it("adds", || crate::expect::expect_to_be(1 + 1, 2));
            d.it("fails on purpose", || crate::expect::expect_to_be(1 + 1, 3));
        });

        let summary = registry.run();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.tests[0].name, "math > adds");
        assert!(summary.tests[1].error.is_some());
    }

    #[test]
    fn panicking_case_is_reported_as_failure_not_propagated() {
        let mut registry = TestRegistry::new();
        registry.it("panics", || panic!("kaboom"));
        let summary = registry.run();
        assert_eq!(summary.failed, 1);
        assert!(summary.tests[0].error.as_deref().unwrap().contains("kaboom"));
    }
}
