//! Sandbox Runner implementing spec.md §4.D: module initialization, console
//! capture, network policy, timeout/cancellation racing, and the tests/
//! script subrun harnesses.

mod console;
mod context;
mod error;
mod expect;
mod module;
mod runner;
mod types;

pub use console::{ConsoleBuffer, ConsoleEntry, ConsoleLevel};
pub use context::{ConsoleHandle, NetworkCapability, SandboxContext};
pub use error::SandboxError;
pub use expect::{
    expect_contain, expect_falsy, expect_match, expect_to_be, expect_to_equal, expect_to_throw,
    expect_truthy, TestFailure,
};
pub use module::{BoxFuture, BoxedHandler, Module, ScriptBody, TestBody, TestRegistrar, TestRegistry};
pub use runner::{ExecutionResult, SandboxConfig, SandboxInput, SandboxRunner};
pub use types::{SandboxRequest, SandboxResponse, TestCaseResult, TestSummary};
