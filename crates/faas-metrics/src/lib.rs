//! Cross-function metrics aggregation and export, implementing spec.md
//! §4.G's "Metrics Exporter": per-function counters and a duration
//! histogram, rendered as Prometheus text, OpenMetrics text, or hierarchical
//! JSON.

mod histogram;
mod registry;

pub mod export;

pub use histogram::{DurationHistogram, DURATION_BUCKETS};
pub use registry::{FunctionSnapshot, MetricsRegistry};
