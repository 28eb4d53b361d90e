//! Percentile computation shared by the executor's aggregate metrics and the
//! metrics exporter's duration histograms.
//!
//! Two distinct algorithms are used depending on sample size: for small
//! samples, linear interpolation on the sorted values gives a smoother
//! estimate; for larger samples a nearest-rank lookup is cheaper and the
//! interpolation error becomes negligible.

/// Computes `p50`, `p95`, and `p99` over `samples` (not required to be
/// sorted; this function sorts a copy). Returns `(0.0, 0.0, 0.0)` for an
/// empty sample set.
pub fn p50_p95_p99(samples: &[f64]) -> (f64, f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    (
        percentile(&sorted, 50.0),
        percentile(&sorted, 95.0),
        percentile(&sorted, 99.0),
    )
}

/// Computes the `p`th percentile (0-100) over an already-sorted slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    if sorted.len() < 100 {
        let rank = (p / 100.0) * (sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        if lower == upper {
            return sorted[lower];
        }
        let weight = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * weight
    } else {
        let n = sorted.len();
        let index = ((p / 100.0) * n as f64).ceil() as isize - 1;
        let clamped = index.clamp(0, n as isize - 1) as usize;
        sorted[clamped]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_samples_return_zero() {
        assert_eq!(p50_p95_p99(&[]), (0.0, 0.0, 0.0));
    }

    #[test]
    fn single_sample_returns_itself_for_all_percentiles() {
        assert_eq!(p50_p95_p99(&[42.0]), (42.0, 42.0, 42.0));
    }

    #[test]
    fn small_sample_uses_linear_interpolation() {
        let samples: Vec<f64> = (1..=10).map(|n| n as f64).collect();
        let (p50, _, _) = p50_p95_p99(&samples);
        // rank = 0.5 * 9 = 4.5 -> interpolate between sorted[4]=5 and sorted[5]=6
        assert_eq!(p50, 5.5);
    }

    #[test]
    fn large_sample_uses_nearest_rank() {
        let samples: Vec<f64> = (1..=200).map(|n| n as f64).collect();
        let (p50, p95, p99) = p50_p95_p99(&samples);
        assert_eq!(p50, 100.0);
        assert_eq!(p95, 190.0);
        assert_eq!(p99, 198.0);
    }
}
