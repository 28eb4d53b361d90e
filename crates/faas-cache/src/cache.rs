use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use faas_core::{CodeHash, FunctionId};

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::pending::PendingLoads;
use crate::store::CacheStore;

/// Tunables recognized by the cache, per spec.md §6 configuration options.
#[derive(Clone, Copy)]
pub struct CacheConfig {
    pub max_cache_size: usize,
    /// `Duration::ZERO` means entries never TTL-expire (spec.md's `cacheTTL = 0`).
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 1000,
            ttl: Duration::ZERO,
        }
    }
}

/// Snapshot of cache hit/miss/dedup counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub dedup_hits: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU+TTL module cache with content-hash dedup and singleflight coalescing
/// (spec.md §4.B), generic over the stub payload `V` and the loader's error
/// type `E` so it has no compile-time dependency on the sandbox or loader
/// crates.
pub struct Cache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    store: Mutex<CacheStore<V>>,
    pending: Arc<PendingLoads<V, E>>,
    hits: AtomicU64,
    misses: AtomicU64,
    dedup_hits: AtomicU64,
    config: CacheConfig,
}

impl<V, E> Cache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: Mutex::new(CacheStore::new(config.max_cache_size, config.ttl)),
            pending: Arc::new(PendingLoads::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            dedup_hits: AtomicU64::new(0),
            config,
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            dedup_hits: self.dedup_hits.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn invalidate(&self, function_id: &FunctionId) {
        self.store.lock().remove(function_id);
    }

    /// `get(functionId)` per spec.md §4.B: no code hash known, so the dedup
    /// index is not consulted — only the entry map and coalescing map.
    pub async fn get<F, Fut>(
        &self,
        function_id: &FunctionId,
        load: F,
    ) -> Result<V, CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_or_load(function_id, None, load).await
    }

    /// `loadFunction(id, code, ...)` per spec.md §4.B: consults the
    /// `codeHash -> FunctionId` dedup index before falling back to the
    /// ordinary get/miss/coalesce path.
    pub async fn load_function<F, Fut>(
        &self,
        function_id: &FunctionId,
        code_hash: CodeHash,
        load: F,
    ) -> Result<V, CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_or_load(function_id, Some(code_hash), load).await
    }

    async fn get_or_load<F, Fut>(
        &self,
        function_id: &FunctionId,
        code_hash: Option<CodeHash>,
        load: F,
    ) -> Result<V, CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        // Step 1/2: existing, valid entry hits; stale entries are purged by
        // `CacheStore::get` as a side effect.
        if let Some(stub) = self.store.lock().get(function_id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(stub);
        }

        // loadFunction extension: dedup against another FunctionId sharing
        // the same code hash before treating this as a cache miss.
        if let Some(hash) = code_hash {
            let dedup = {
                let mut store = self.store.lock();
                store.get_by_code_hash(&hash)
            };
            if let Some((_, stub)) = dedup {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.dedup_hits.fetch_add(1, Ordering::Relaxed);
                self.insert(function_id.clone(), CacheEntry::new(stub.clone(), hash));
                return Ok(stub);
            }
        }

        // Step 3: coalesce against an in-flight load for this function id.
        match self.pending.try_join(function_id.clone()) {
            Err(mut waiter) => match waiter.recv().await {
                Ok(result) => result.map_err(CacheError::Load),
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    Err(CacheError::LoadCancelled)
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                    Err(CacheError::RecvLagged)
                }
            },
            Ok(leader) => {
                // Step 4: genuine miss; this call becomes the singleflight
                // leader and drives the load to completion.
                self.misses.fetch_add(1, Ordering::Relaxed);
                let result = load().await;

                if let Ok(stub) = &result {
                    let hash = code_hash.unwrap_or_else(|| {
                        CodeHash::digest(function_id.as_str(), None, None)
                    });
                    self.insert(function_id.clone(), CacheEntry::new(stub.clone(), hash));
                }

                leader.complete(result.clone());
                result.map_err(CacheError::Load)
            }
        }
    }

    fn insert(&self, function_id: FunctionId, entry: CacheEntry<V>) {
        let mut store = self.store.lock();
        store.insert(function_id, entry);
    }
}
