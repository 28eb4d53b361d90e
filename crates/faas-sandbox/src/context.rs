use std::sync::Arc;

use parking_lot::Mutex;

use crate::console::{ConsoleBuffer, ConsoleLevel};
use crate::error::SandboxError;
use crate::types::{SandboxRequest, SandboxResponse};

/// The capability a handler uses to make outbound calls. When network is
/// blocked (spec.md §4.D step 4), every attempt fails with a sandbox error
/// instead of reaching the real network — mirroring "replace the network
/// call capability with one that fails every attempt".
#[derive(Clone)]
pub struct NetworkCapability {
    blocked: bool,
}

impl NetworkCapability {
    pub(crate) fn new(blocked: bool) -> Self {
        Self { blocked }
    }

    /// A handler calls this before issuing any outbound request through
    /// whatever real transport it has been handed out-of-band.
    pub fn check(&self) -> Result<(), SandboxError> {
        if self.blocked {
            Err(SandboxError::NetworkBlocked)
        } else {
            Ok(())
        }
    }

    pub async fn fetch(&self, _req: SandboxRequest) -> Result<SandboxResponse, SandboxError> {
        self.check()?;
        Err(SandboxError::NetworkUnavailable)
    }
}

/// Handed to every handler/script invocation so it can write to the
/// per-invocation console buffer (spec.md §4.D step 3) without holding a
/// raw reference into the runner.
#[derive(Clone)]
pub struct ConsoleHandle {
    buffer: Arc<Mutex<ConsoleBuffer>>,
}

impl ConsoleHandle {
    pub(crate) fn new(max_entries: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(ConsoleBuffer::new(max_entries))),
        }
    }

    pub fn log(&self, message: impl Into<String>) {
        self.buffer.lock().push(ConsoleLevel::Log, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.buffer.lock().push(ConsoleLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.buffer.lock().push(ConsoleLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.buffer.lock().push(ConsoleLevel::Error, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.buffer.lock().push(ConsoleLevel::Debug, message);
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.buffer.lock().push(ConsoleLevel::Fatal, message);
    }

    pub(crate) fn drain(&self) -> Vec<crate::console::ConsoleEntry> {
        let mut buffer = self.buffer.lock();
        std::mem::replace(&mut *buffer, ConsoleBuffer::new(0)).into_entries()
    }
}

/// Per-invocation ambient capabilities, fresh for every call so that globals
/// set by one execution are never observable by another (spec.md §4.E
/// isolation guarantee).
#[derive(Clone)]
pub struct SandboxContext {
    pub console: ConsoleHandle,
    pub network: NetworkCapability,
}

impl SandboxContext {
    pub(crate) fn new(max_console_entries: usize, block_network: bool) -> Self {
        Self {
            console: ConsoleHandle::new(max_console_entries),
            network: NetworkCapability::new(block_network),
        }
    }
}
