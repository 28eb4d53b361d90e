use std::time::{Duration, Instant};

use faas_core::CodeHash;

/// `{ stub, codeHash, loadedAt, lastAccessedAt }` from spec.md §3. Keyed by
/// `FunctionId` in [`crate::store::CacheStore`].
#[derive(Clone)]
pub struct CacheEntry<V> {
    pub stub: V,
    pub code_hash: CodeHash,
    pub loaded_at: Instant,
    pub last_accessed_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(stub: V, code_hash: CodeHash) -> Self {
        let now = Instant::now();
        Self {
            stub,
            code_hash,
            loaded_at: now,
            last_accessed_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Instant::now();
    }

    /// An entry is valid iff `ttl == 0` (never expires) or the entry is
    /// younger than `ttl`, per spec.md §3.
    pub fn is_valid(&self, ttl: Duration) -> bool {
        ttl.is_zero() || self.loaded_at.elapsed() < ttl
    }
}
