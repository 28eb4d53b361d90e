use thiserror::Error;

/// Errors surfaced by [`crate::ExecutionStore`] and [`crate::LogStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid cursor")]
    InvalidCursor,
}
