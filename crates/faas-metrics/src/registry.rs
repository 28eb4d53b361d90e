use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use faas_core::FunctionId;

use crate::histogram::DurationHistogram;

/// Atomic counters plus a duration histogram for one function, per spec.md
/// §4.G's `functions_*` families. `language` is set once, on first
/// observation, and never overwritten — a function does not change
/// implementation language mid-flight.
#[derive(Default)]
pub(crate) struct FunctionCounters {
    invocations: AtomicU64,
    errors: AtomicU64,
    cold_starts: AtomicU64,
    warm_starts: AtomicU64,
    rate_limit_hits: AtomicU64,
    memory_bytes: AtomicU64,
    duration: DurationHistogram,
    language: Mutex<Option<String>>,
}

impl FunctionCounters {
    fn set_language(&self, language: Option<&str>) {
        if let Some(lang) = language {
            let mut slot = self.language.lock();
            if slot.is_none() {
                *slot = Some(lang.to_string());
            }
        }
    }
}

/// Per-function snapshot, laid out to match spec.md §4.G's JSON export
/// `functions.<id>` object: `{invocationCount, durationMetrics, errorRate,
/// memoryMetrics, coldStartMetrics, rateLimitMetrics}`.
pub struct FunctionSnapshot {
    pub function_id: FunctionId,
    pub language: Option<String>,
    pub invocation_count: u64,
    pub error_count: u64,
    pub cold_start_count: u64,
    pub warm_start_count: u64,
    pub rate_limit_hit_count: u64,
    pub memory_bytes: u64,
    pub duration_sum_seconds: f64,
    pub duration_count: u64,
    pub duration_buckets: Vec<u64>,
}

impl FunctionSnapshot {
    pub fn error_rate(&self) -> f64 {
        if self.invocation_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.invocation_count as f64
        }
    }

    pub fn avg_duration_seconds(&self) -> f64 {
        if self.duration_count == 0 {
            0.0
        } else {
            self.duration_sum_seconds / self.duration_count as f64
        }
    }
}

/// Cross-function metrics registry (spec.md §4.G "Metrics Exporter"): one
/// [`FunctionCounters`] per function, held behind a `parking_lot::Mutex`ed
/// `HashMap` — the same per-key registry idiom `faas-circuitbreaker` and
/// `faas-cache` use for their own per-function state.
#[derive(Default)]
pub struct MetricsRegistry {
    functions: Mutex<HashMap<FunctionId, Arc<FunctionCounters>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters_for(&self, function_id: &FunctionId) -> Arc<FunctionCounters> {
        self.functions
            .lock()
            .entry(function_id.clone())
            .or_insert_with(|| Arc::new(FunctionCounters::default()))
            .clone()
    }

    pub fn record_invocation(&self, function_id: &FunctionId, language: Option<&str>) {
        let counters = self.counters_for(function_id);
        counters.invocations.fetch_add(1, Ordering::Relaxed);
        counters.set_language(language);
    }

    pub fn record_error(&self, function_id: &FunctionId) {
        self.counters_for(function_id).errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cold_start(&self, function_id: &FunctionId) {
        let counters = self.counters_for(function_id);
        counters.cold_starts.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "tracing")]
        tracing::debug!(function_id = %function_id, "cold start");
    }

    pub fn record_warm_start(&self, function_id: &FunctionId) {
        self.counters_for(function_id).warm_starts.fetch_add(1, Ordering::Relaxed);
    }

    /// Reporting-only, per spec.md §4.E's `recordRateLimitHit` — the registry
    /// never enforces a rate limit itself.
    pub fn record_rate_limit_hit(&self, function_id: &FunctionId) {
        let counters = self.counters_for(function_id);
        counters.rate_limit_hits.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "tracing")]
        tracing::debug!(function_id = %function_id, "rate limit hit recorded");
    }

    pub fn record_duration(&self, function_id: &FunctionId, duration_secs: f64) {
        self.counters_for(function_id).duration.observe(duration_secs);
    }

    pub fn record_memory(&self, function_id: &FunctionId, bytes: u64) {
        self.counters_for(function_id)
            .memory_bytes
            .store(bytes, Ordering::Relaxed);
    }

    /// An immutable snapshot over every function observed so far, in
    /// registration order is not guaranteed — exporters sort as needed.
    pub fn snapshot(&self) -> Vec<FunctionSnapshot> {
        self.functions
            .lock()
            .iter()
            .map(|(function_id, counters)| FunctionSnapshot {
                function_id: function_id.clone(),
                language: counters.language.lock().clone(),
                invocation_count: counters.invocations.load(Ordering::Relaxed),
                error_count: counters.errors.load(Ordering::Relaxed),
                cold_start_count: counters.cold_starts.load(Ordering::Relaxed),
                warm_start_count: counters.warm_starts.load(Ordering::Relaxed),
                rate_limit_hit_count: counters.rate_limit_hits.load(Ordering::Relaxed),
                memory_bytes: counters.memory_bytes.load(Ordering::Relaxed),
                duration_sum_seconds: counters.duration.sum_seconds(),
                duration_count: counters.duration.count(),
                duration_buckets: counters.duration.cumulative_counts(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(s: &str) -> FunctionId {
        FunctionId::from(s)
    }

    #[test]
    fn every_invocation_and_error_is_attributed_to_its_function() {
        let registry = MetricsRegistry::new();
        registry.record_invocation(&fid("f"), Some("rust"));
        registry.record_invocation(&fid("f"), Some("rust"));
        registry.record_error(&fid("f"));

        let snap = registry.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].invocation_count, 2);
        assert_eq!(snap[0].error_count, 1);
        assert_eq!(snap[0].error_rate(), 0.5);
        assert_eq!(snap[0].language.as_deref(), Some("rust"));
    }

    #[test]
    fn language_set_on_first_observation_is_not_overwritten() {
        let registry = MetricsRegistry::new();
        registry.record_invocation(&fid("f"), Some("rust"));
        registry.record_invocation(&fid("f"), Some("typescript"));
        let snap = registry.snapshot();
        assert_eq!(snap[0].language.as_deref(), Some("rust"));
    }

    #[test]
    fn unobserved_function_never_appears_in_the_snapshot() {
        let registry = MetricsRegistry::new();
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn distinct_functions_get_independent_counters() {
        let registry = MetricsRegistry::new();
        registry.record_invocation(&fid("a"), None);
        registry.record_invocation(&fid("b"), None);
        registry.record_invocation(&fid("b"), None);

        let snap = registry.snapshot();
        let a = snap.iter().find(|s| s.function_id == fid("a")).unwrap();
        let b = snap.iter().find(|s| s.function_id == fid("b")).unwrap();
        assert_eq!(a.invocation_count, 1);
        assert_eq!(b.invocation_count, 2);
    }
}
