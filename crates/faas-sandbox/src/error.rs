use thiserror::Error;

/// Stable sandbox-level error kinds, per spec.md §4.D.
#[derive(Debug, Clone, Error)]
pub enum SandboxError {
    #[error("compilation error: {0}")]
    CompilationError(String),
    #[error("network access is blocked in this sandbox")]
    NetworkBlocked,
    #[error("sandbox has no real network transport")]
    NetworkUnavailable,
    #[error("filesystem and process access are denied in this sandbox")]
    FilesystemAccessDenied,
}
