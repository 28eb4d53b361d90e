use faas_core::{CodeHash, FunctionId};
use faas_sandbox::Module;

/// A Module Stub (spec.md §3): compiled code wired up for sandboxed
/// invocation, keyed by the function it was loaded for. Cheap to clone —
/// the actual handler/test/script closures live behind `Arc`s inside
/// `Module`, so clones of a stub all wrap the same compiled code.
#[derive(Clone)]
pub struct ModuleStub {
    pub id: FunctionId,
    pub code_hash: CodeHash,
    pub module: Module,
    /// Set when this stub was produced by a failed compilation (spec.md
    /// §4.D: "an empty sandbox stub that returns 500 for all subsequent
    /// invocations"). `module` has no `fetch` handler in that case, so
    /// every invocation through it 500s without needing to recompile.
    pub compile_error: Option<String>,
}

impl ModuleStub {
    pub fn new(id: FunctionId, code_hash: CodeHash, module: Module) -> Self {
        Self {
            id,
            code_hash,
            module,
            compile_error: None,
        }
    }

    pub fn compile_failed(id: FunctionId, code_hash: CodeHash, details: impl Into<String>) -> Self {
        Self {
            id,
            code_hash,
            module: Module::new(None),
            compile_error: Some(details.into()),
        }
    }
}

/// Outcome of `loadFunction`, per spec.md §4.C.
#[derive(Clone)]
pub struct LoadResult {
    pub success: bool,
    pub stub: Option<ModuleStub>,
    pub error: Option<String>,
}

impl LoadResult {
    pub fn ok(stub: ModuleStub) -> Self {
        Self {
            success: true,
            stub: Some(stub),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            stub: None,
            error: Some(error.into()),
        }
    }

    /// A failed load that still carries a stub (spec.md §4.D: a compilation
    /// error yields an empty sandbox stub that 500s on every subsequent
    /// invocation, rather than no stub at all).
    pub fn failed_with_stub(error: impl Into<String>, stub: ModuleStub) -> Self {
        Self {
            success: false,
            stub: Some(stub),
            error: Some(error.into()),
        }
    }
}
