use crate::export::prometheus;
use crate::registry::MetricsRegistry;

/// `Content-Type` for the OpenMetrics text exposition format, spec.md §4.G.
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Renders the same families as [`prometheus::render`], with the counter
/// families' `_total` suffix dropped and a terminating `# EOF` line — the
/// only two differences spec.md §4.G calls out between the two formats.
pub fn render(registry: &MetricsRegistry) -> String {
    let mut text = prometheus::render_with_total_suffix(registry, false);
    text.push_str("# EOF\n");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use faas_core::FunctionId;

    #[test]
    fn counters_drop_the_total_suffix_and_output_ends_with_eof() {
        let registry = MetricsRegistry::new();
        registry.record_invocation(&FunctionId::from("f"), None);
        let text = render(&registry);
        assert!(text.contains("functions_invocations{function_id=\"f\"} 1"));
        assert!(!text.contains("functions_invocations_total"));
        assert!(text.trim_end().ends_with("# EOF"));
    }
}
