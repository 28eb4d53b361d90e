use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative bucket boundaries for `functions_duration_seconds`, per
/// spec.md §4.G. The implicit last bucket is `+Inf`.
pub const DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

/// A cumulative duration histogram: `observe(v)` increments every bucket
/// whose boundary is `>= v`, so bucket `i`'s count is "observations `<=`
/// boundary `i`" — the Prometheus/OpenMetrics convention.
#[derive(Debug, Default)]
pub struct DurationHistogram {
    buckets: Vec<AtomicU64>,
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl DurationHistogram {
    pub fn new() -> Self {
        let mut buckets = Vec::with_capacity(DURATION_BUCKETS.len() + 1);
        for _ in 0..=DURATION_BUCKETS.len() {
            buckets.push(AtomicU64::new(0));
        }
        Self {
            buckets,
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, duration_secs: f64) {
        let bucket_idx = DURATION_BUCKETS
            .iter()
            .position(|&boundary| duration_secs <= boundary)
            .unwrap_or(DURATION_BUCKETS.len());

        for bucket in &self.buckets[bucket_idx..] {
            bucket.fetch_add(1, Ordering::Relaxed);
        }

        let micros = (duration_secs * 1_000_000.0).max(0.0) as u64;
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative counts, one per boundary in [`DURATION_BUCKETS`] plus a
    /// trailing `+Inf` bucket.
    pub fn cumulative_counts(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect()
    }

    pub fn sum_seconds(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
