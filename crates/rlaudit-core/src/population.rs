//! Population mean under the null hypothesis.
//!
//! H0 says the true mean of all `N` assort values is at most 1/2. After
//! drawing `j` values without replacement with sum `S`, the mean of the
//! cards still in the urn must be `(N/2 - S) / (N - j)` for H0 to hold.
//! With replacement, or before any draw, it stays exactly 1/2.
//!
//! The result may leave `[0, u]`. Callers treat that as a terminal signal:
//! below 0 the drawn mass alone already exceeds `N/2` (H0 is false); above
//! `u` no assignment of the remaining cards can reach `N/2` (H0 is true).

use crate::tracker::SampleTracker;

/// Null mean of the assort values.
pub const NULL_MEAN: f64 = 0.5;

/// `µ_j` for the next draw given the previous ones in `tracker`.
#[must_use]
pub fn population_mean_under_null(
    population_size: usize,
    without_replacement: bool,
    tracker: &SampleTracker,
) -> f64 {
    let drawn = tracker.count();
    if drawn == 0 || !without_replacement {
        return NULL_MEAN;
    }
    let remaining = population_size as f64 - drawn as f64;
    (population_size as f64 * NULL_MEAN - tracker.sum()) / remaining
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with(xs: &[f64]) -> SampleTracker {
        let mut tracker = SampleTracker::new();
        for x in xs {
            tracker.add(*x);
        }
        tracker
    }

    #[test]
    fn exactly_half_with_replacement_or_no_samples() {
        let empty = SampleTracker::new();
        let full = tracker_with(&[1.0, 1.0, 0.0, 1.0]);
        for n in [1, 10, 1000, 1_000_000] {
            assert_eq!(population_mean_under_null(n, true, &empty), 0.5);
            assert_eq!(population_mean_under_null(n, false, &full), 0.5);
        }
    }

    #[test]
    fn finite_population_correction() {
        let tracker = tracker_with(&[1.0, 0.0, 1.0]);
        let mu = population_mean_under_null(10, true, &tracker);
        assert!((mu - 3.0 / 7.0).abs() < 1e-15, "mu={mu}");
    }

    #[test]
    fn leaves_unit_interval_at_the_edges() {
        // N=4: three draws of 1.0 overshoot the null mass of 2.0
        let winners = tracker_with(&[1.0, 1.0, 1.0]);
        assert!(population_mean_under_null(4, true, &winners) < 0.0);
        // N=4: three zeros leave 2.0 of mass for one card
        let losers = tracker_with(&[0.0, 0.0, 0.0]);
        assert!(population_mean_under_null(4, true, &losers) > 1.0);
    }
}
