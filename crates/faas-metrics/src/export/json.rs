use std::collections::HashMap;

use serde::Serialize;

use crate::registry::MetricsRegistry;

/// `Content-Type` for the JSON metrics export, spec.md §4.G.
pub const CONTENT_TYPE: &str = "application/json";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DurationMetrics {
    avg_seconds: f64,
    sum_seconds: f64,
    count: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemoryMetrics {
    bytes: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ColdStartMetrics {
    cold_starts: u64,
    warm_starts: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitMetrics {
    hits: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionExport {
    invocation_count: u64,
    duration_metrics: DurationMetrics,
    error_rate: f64,
    memory_metrics: MemoryMetrics,
    cold_start_metrics: ColdStartMetrics,
    rate_limit_metrics: RateLimitMetrics,
}

/// `{functions: {<id>: {...}}, totalInvocations, languageBreakdown,
/// exportedAt}` from spec.md §4.G.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsExport {
    functions: HashMap<String, FunctionExport>,
    total_invocations: u64,
    language_breakdown: HashMap<String, u64>,
    exported_at: u64,
}

/// Builds the hierarchical export. `now_ms` is the caller's wall-clock time
/// in epoch milliseconds — kept as a parameter rather than read internally
/// so the export stays deterministic in tests.
pub fn export(registry: &MetricsRegistry, now_ms: u64) -> MetricsExport {
    let snapshots = registry.snapshot();

    let mut functions = HashMap::with_capacity(snapshots.len());
    let mut language_breakdown: HashMap<String, u64> = HashMap::new();
    let mut total_invocations = 0u64;

    for snap in &snapshots {
        total_invocations += snap.invocation_count;
        if let Some(lang) = &snap.language {
            *language_breakdown.entry(lang.clone()).or_insert(0) += snap.invocation_count;
        }

        functions.insert(
            snap.function_id.as_str().to_string(),
            FunctionExport {
                invocation_count: snap.invocation_count,
                duration_metrics: DurationMetrics {
                    avg_seconds: snap.avg_duration_seconds(),
                    sum_seconds: snap.duration_sum_seconds,
                    count: snap.duration_count,
                },
                error_rate: snap.error_rate(),
                memory_metrics: MemoryMetrics { bytes: snap.memory_bytes },
                cold_start_metrics: ColdStartMetrics {
                    cold_starts: snap.cold_start_count,
                    warm_starts: snap.warm_start_count,
                },
                rate_limit_metrics: RateLimitMetrics { hits: snap.rate_limit_hit_count },
            },
        );
    }

    MetricsExport {
        functions,
        total_invocations,
        language_breakdown,
        exported_at: now_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faas_core::FunctionId;

    #[test]
    fn total_invocations_equals_the_sum_over_every_function() {
        let registry = MetricsRegistry::new();
        registry.record_invocation(&FunctionId::from("a"), Some("rust"));
        registry.record_invocation(&FunctionId::from("b"), Some("rust"));
        registry.record_invocation(&FunctionId::from("b"), Some("rust"));

        let export = export(&registry, 1_000);
        assert_eq!(export.total_invocations, 3);
        assert_eq!(export.language_breakdown.get("rust"), Some(&3));
        assert_eq!(export.functions.len(), 2);
        assert_eq!(export.exported_at, 1_000);
    }

    #[test]
    fn empty_registry_exports_empty_maps() {
        let registry = MetricsRegistry::new();
        let export = export(&registry, 0);
        assert!(export.functions.is_empty());
        assert_eq!(export.total_invocations, 0);
    }
}
