//! National percentile ranking of composite risk scores.

/// Sorted distribution of every positive score in the source table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PercentileRankEngine {
    sorted: Vec<f64>,
}

impl PercentileRankEngine {
    /// Builds the distribution from `scores`, keeping only finite values
    /// greater than zero.
    #[must_use]
    pub fn new(scores: impl IntoIterator<Item = f64>) -> Self {
        let mut sorted: Vec<f64> = scores
            .into_iter()
            .filter(|s| s.is_finite() && *s > 0.0)
            .collect();
        sorted.sort_by(f64::total_cmp);
        if sorted.is_empty() {
            log::warn!("Percentile distribution is empty; every percentile will be 0");
        }
        Self { sorted }
    }

    /// Number of scores in the distribution.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    /// Whether the distribution is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Percentile (0-100) at which `score` falls.
    ///
    /// An exact match takes the rank of its leftmost occurrence; anything
    /// else interpolates linearly between the ranks of the bracketing
    /// scores.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::float_cmp)]
    pub fn percentile(&self, score: f64) -> f64 {
        let n = self.sorted.len();
        if n == 0 || score.is_nan() || score <= 0.0 {
            return 0.0;
        }
        if n == 1 {
            return 50.0;
        }
        let max = self.sorted[n - 1];
        if score > max {
            return 100.0;
        }

        let i = self.sorted.partition_point(|v| *v < score);
        let last = (n - 1) as f64;
        if self.sorted[i] == score {
            return i as f64 / last * 100.0;
        }
        if i == 0 {
            return 0.0;
        }

        let (lo, hi) = (self.sorted[i - 1], self.sorted[i]);
        let rank = (i - 1) as f64 + (score - lo) / (hi - lo);
        (rank / last * 100.0).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PercentileRankEngine {
        PercentileRankEngine::new([30.0, 20.0, 10.0, 20.0, 0.0, -5.0])
    }

    #[test]
    fn keeps_only_positive_scores() {
        assert_eq!(engine().len(), 4);
    }

    #[test]
    fn exact_match_uses_leftmost_rank() {
        assert!((engine().percentile(20.0) - 100.0 / 3.0).abs() < 1e-9);
        assert!(engine().percentile(10.0).abs() < 1e-9);
        assert!((engine().percentile(30.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn interpolates_between_brackets() {
        assert!((engine().percentile(15.0) - 50.0 / 3.0).abs() < 1e-9);
        assert!((engine().percentile(25.0) - 250.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn edge_cases() {
        let e = engine();
        assert!(e.percentile(0.0).abs() < f64::EPSILON);
        assert!(e.percentile(-3.0).abs() < f64::EPSILON);
        assert!(e.percentile(5.0).abs() < f64::EPSILON);
        assert!((e.percentile(31.0) - 100.0).abs() < f64::EPSILON);

        let single = PercentileRankEngine::new([42.0]);
        assert!((single.percentile(1.0) - 50.0).abs() < f64::EPSILON);
        assert!((single.percentile(1000.0) - 50.0).abs() < f64::EPSILON);
        assert!(single.percentile(0.0).abs() < f64::EPSILON);

        let empty = PercentileRankEngine::new([0.0]);
        assert!(empty.is_empty());
        assert!(empty.percentile(50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn monotonic_in_score() {
        let e = PercentileRankEngine::new([3.0, 7.5, 7.5, 12.0, 40.0, 41.0, 99.0]);
        let mut previous = 0.0;
        for step in 0..1100 {
            let p = e.percentile(f64::from(step) / 10.0);
            assert!(p >= previous, "percentile decreased at {step}");
            assert!((0.0..=100.0).contains(&p));
            previous = p;
        }
    }
}
