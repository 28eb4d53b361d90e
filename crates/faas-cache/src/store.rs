use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use faas_core::{CodeHash, FunctionId};

use crate::entry::CacheEntry;

/// Backing store for the module cache: an `lru::LruCache` keyed by
/// `FunctionId` (for genuine O(1) recency bumps and tail eviction, matching
/// spec.md's "evict smallest lastAccessedAt" rule exactly) plus the
/// `codeHash -> FunctionId` secondary index used for dedup.
pub(crate) struct CacheStore<V> {
    entries: lru::LruCache<FunctionId, CacheEntry<V>>,
    hash_index: HashMap<CodeHash, FunctionId>,
    ttl: Duration,
}

impl<V: Clone> CacheStore<V> {
    pub(crate) fn new(max_cache_size: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(max_cache_size).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            entries: lru::LruCache::new(cap),
            hash_index: HashMap::new(),
            ttl,
        }
    }

    /// Returns the cached stub if present and not stale, bumping recency.
    /// Stale entries are evicted as a side effect (spec.md §4.B step 2).
    pub(crate) fn get(&mut self, function_id: &FunctionId) -> Option<V> {
        let stale = match self.entries.get(function_id) {
            Some(entry) => !entry.is_valid(self.ttl),
            None => return None,
        };

        if stale {
            self.remove(function_id);
            return None;
        }

        let entry = self.entries.get_mut(function_id)?;
        entry.touch();
        Some(entry.stub.clone())
    }

    /// Resolves the dedup secondary index: if `code_hash` maps to a
    /// different, still-valid `FunctionId`, returns its stub.
    pub(crate) fn get_by_code_hash(&mut self, code_hash: &CodeHash) -> Option<(FunctionId, V)> {
        let target = self.hash_index.get(code_hash)?.clone();
        let stub = self.get(&target)?;
        Some((target, stub))
    }

    /// Inserts `entry` under `function_id`, enforcing the size limit by
    /// evicting the least-recently-used entry. Returns the evicted
    /// `(FunctionId, CodeHash)` if an eviction occurred, so the caller can
    /// clean up the hash index.
    pub(crate) fn insert(
        &mut self,
        function_id: FunctionId,
        entry: CacheEntry<V>,
    ) -> Option<(FunctionId, CodeHash)> {
        self.hash_index
            .insert(entry.code_hash, function_id.clone());
        self.entries
            .push(function_id, entry)
            .map(|(evicted_id, evicted_entry)| (evicted_id, evicted_entry.code_hash))
            .and_then(|(evicted_id, evicted_hash)| {
                // Only drop the hash index edge if it still points at the
                // evicted id (it may have been overwritten by a newer entry
                // sharing the same code hash).
                if self.hash_index.get(&evicted_hash) == Some(&evicted_id) {
                    self.hash_index.remove(&evicted_hash);
                }
                Some((evicted_id, evicted_hash))
            })
    }

    pub(crate) fn remove(&mut self, function_id: &FunctionId) -> Option<CacheEntry<V>> {
        let entry = self.entries.pop(function_id)?;
        if self.hash_index.get(&entry.code_hash) == Some(function_id) {
            self.hash_index.remove(&entry.code_hash);
        }
        Some(entry)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
