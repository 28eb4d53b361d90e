use std::fmt::Write as _;

use crate::histogram::DURATION_BUCKETS;
use crate::registry::{FunctionSnapshot, MetricsRegistry};

/// `Content-Type` for the Prometheus text exposition format, spec.md §4.G.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Escapes a label value per the Prometheus text format: `\`, `"`, and
/// newline, in that order (escaping `\` first avoids double-escaping the
/// backslashes introduced by the later substitutions).
fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn labels(function_id: &str, language: Option<&str>) -> String {
    match language {
        Some(lang) => format!(
            "function_id=\"{}\",language=\"{}\"",
            escape_label(function_id),
            escape_label(lang)
        ),
        None => format!("function_id=\"{}\"", escape_label(function_id)),
    }
}

fn render_counter(out: &mut String, name: &str, help: &str, snapshots: &[FunctionSnapshot], value: impl Fn(&FunctionSnapshot) -> u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    for snap in snapshots {
        let _ = writeln!(
            out,
            "{name}{{{}}} {}",
            labels(snap.function_id.as_str(), snap.language.as_deref()),
            value(snap)
        );
    }
}

fn render_gauge(out: &mut String, name: &str, help: &str, snapshots: &[FunctionSnapshot], value: impl Fn(&FunctionSnapshot) -> u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    for snap in snapshots {
        let _ = writeln!(
            out,
            "{name}{{{}}} {}",
            labels(snap.function_id.as_str(), snap.language.as_deref()),
            value(snap)
        );
    }
}

/// Renders every metric family over `registry`'s current snapshot, in the
/// Prometheus text exposition format.
pub fn render(registry: &MetricsRegistry) -> String {
    render_with_total_suffix(registry, true)
}

pub(crate) fn render_with_total_suffix(registry: &MetricsRegistry, total_suffix: bool) -> String {
    let snapshots = registry.snapshot();
    let mut out = String::new();

    let counter_name = |base: &str| if total_suffix { format!("{base}_total") } else { base.to_string() };

    render_counter(
        &mut out,
        &counter_name("functions_invocations"),
        "Total number of function invocations.",
        &snapshots,
        |s| s.invocation_count,
    );
    render_counter(
        &mut out,
        &counter_name("functions_errors"),
        "Total number of failed invocations.",
        &snapshots,
        |s| s.error_count,
    );
    render_counter(
        &mut out,
        &counter_name("functions_cold_starts"),
        "Total number of cold-start invocations.",
        &snapshots,
        |s| s.cold_start_count,
    );
    render_counter(
        &mut out,
        &counter_name("functions_warm_starts"),
        "Total number of warm-start invocations.",
        &snapshots,
        |s| s.warm_start_count,
    );
    render_counter(
        &mut out,
        &counter_name("functions_rate_limit_hits"),
        "Total number of recorded rate-limit hits.",
        &snapshots,
        |s| s.rate_limit_hit_count,
    );

    let _ = writeln!(out, "# HELP functions_duration_seconds Invocation duration in seconds.");
    let _ = writeln!(out, "# TYPE functions_duration_seconds histogram");
    for snap in &snapshots {
        let label_pairs = labels(snap.function_id.as_str(), snap.language.as_deref());
        for (boundary, count) in DURATION_BUCKETS.iter().zip(&snap.duration_buckets) {
            let _ = writeln!(
                out,
                "functions_duration_seconds_bucket{{{label_pairs},le=\"{boundary}\"}} {count}"
            );
        }
        let le_inf = snap.duration_buckets.last().copied().unwrap_or(0);
        let _ = writeln!(
            out,
            "functions_duration_seconds_bucket{{{label_pairs},le=\"+Inf\"}} {le_inf}"
        );
        let _ = writeln!(
            out,
            "functions_duration_seconds_sum{{{label_pairs}}} {}",
            snap.duration_sum_seconds
        );
        let _ = writeln!(
            out,
            "functions_duration_seconds_count{{{label_pairs}}} {}",
            snap.duration_count
        );
    }

    render_gauge(
        &mut out,
        "functions_memory_bytes",
        "Most recently observed memory usage in bytes.",
        &snapshots,
        |s| s.memory_bytes,
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use faas_core::FunctionId;

    #[test]
    fn every_family_appears_for_an_observed_function() {
        let registry = MetricsRegistry::new();
        registry.record_invocation(&FunctionId::from("f"), Some("rust"));
        registry.record_duration(&FunctionId::from("f"), 0.2);
        registry.record_memory(&FunctionId::from("f"), 1024);

        let text = render(&registry);
        assert!(text.contains("functions_invocations_total{function_id=\"f\",language=\"rust\"} 1"));
        assert!(text.contains("functions_duration_seconds_bucket"));
        assert!(text.contains("functions_duration_seconds_sum"));
        assert!(text.contains("functions_memory_bytes"));
    }

    #[test]
    fn label_values_are_escaped() {
        let registry = MetricsRegistry::new();
        registry.record_invocation(&FunctionId::from("weird\"id\\with\nnewline"), None);
        let text = render(&registry);
        assert!(text.contains("weird\\\"id\\\\with\\nnewline"));
    }
}
