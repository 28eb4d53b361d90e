use thiserror::Error;

/// Errors surfaced by [`crate::Cache::get`] / [`crate::Cache::load_function`].
#[derive(Debug, Clone, Error)]
pub enum CacheError<E> {
    /// The load itself failed; carries the caller-supplied loader error.
    #[error("load failed: {0}")]
    Load(E),
    /// This call was a coalescing waiter whose leader was dropped before
    /// completing the load.
    #[error("coalesced load was cancelled")]
    LoadCancelled,
    /// The waiter missed the leader's broadcast result (lagged receiver).
    #[error("failed to receive coalesced load result")]
    RecvLagged,
}
