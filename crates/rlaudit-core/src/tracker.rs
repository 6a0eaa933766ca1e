//! Running state over the draws already consumed by a test.
//!
//! A [`SampleTracker`] is owned by exactly one driver loop. Strategies only
//! ever see it by shared reference, and the driver appends the current draw
//! after the strategy has been consulted. Every estimate is therefore a
//! function of `X_1..X_{j-1}` alone.
//!
//! Comparison audits additionally tally discrepancy values in an
//! [`ErrorTally`]: draws equal to the no-error bassort value bump a single
//! counter, every other draw is bucketed by value.

use crate::error_rates::{ClcaErrorCounts, ErrorRates, Taus};
use crate::numeric::double_is_close;
use crate::welford::RunningStats;

/// Statistics of previous draws.
#[derive(Debug, Clone, Default)]
pub struct SampleTracker {
    stats: RunningStats,
    sum: f64,
    last: f64,
    errors: Option<ErrorTally>,
}

impl SampleTracker {
    /// Tracker without discrepancy bookkeeping (polling audits).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker that also classifies each draw against `noerror`.
    #[must_use]
    pub fn with_error_tally(noerror: f64, upper: f64) -> Self {
        Self {
            errors: Some(ErrorTally::new(noerror, upper)),
            ..Self::default()
        }
    }

    /// Append one draw.
    pub fn add(&mut self, x: f64) {
        self.last = x;
        self.sum += x;
        self.stats.update(x);
        if let Some(tally) = self.errors.as_mut() {
            tally.add(x);
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.stats.count()
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Mean of previous draws, 0 when empty.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.stats.mean()
    }

    /// Population variance of previous draws.
    #[must_use]
    pub fn variance(&self) -> f64 {
        self.stats.variance()
    }

    /// Most recent draw, 0 when empty.
    #[must_use]
    pub fn last(&self) -> f64 {
        self.last
    }

    #[must_use]
    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    #[must_use]
    pub fn error_tally(&self) -> Option<&ErrorTally> {
        self.errors.as_ref()
    }
}

/// Histogram of comparison-audit discrepancy values.
#[derive(Debug, Clone)]
pub struct ErrorTally {
    noerror: f64,
    upper: f64,
    taus: Taus,
    samples: usize,
    noerror_count: usize,
    /// (bassort value, occurrences), in first-seen order.
    counts: Vec<(f64, usize)>,
}

impl ErrorTally {
    #[must_use]
    pub fn new(noerror: f64, upper: f64) -> Self {
        Self {
            noerror,
            upper,
            taus: Taus::new(upper),
            samples: 0,
            noerror_count: 0,
            counts: Vec::new(),
        }
    }

    fn add(&mut self, x: f64) {
        self.samples += 1;
        if self.noerror == 0.0 {
            return;
        }
        if double_is_close(x, self.noerror) {
            self.noerror_count += 1;
            return;
        }
        match self
            .counts
            .iter_mut()
            .find(|(value, _)| double_is_close(x, *value))
        {
            Some((_, count)) => *count += 1,
            None => self.counts.push((x, 1)),
        }
    }

    #[must_use]
    pub fn noerror(&self) -> f64 {
        self.noerror
    }

    #[must_use]
    pub fn upper(&self) -> f64 {
        self.upper
    }

    #[must_use]
    pub fn samples(&self) -> usize {
        self.samples
    }

    #[must_use]
    pub fn noerror_count(&self) -> usize {
        self.noerror_count
    }

    /// Occurrences of draws numerically equal to `value`.
    #[must_use]
    pub fn count_near(&self, value: f64) -> usize {
        if double_is_close(value, self.noerror) {
            return self.noerror_count;
        }
        self.counts
            .iter()
            .filter(|(v, _)| double_is_close(*v, value))
            .map(|(_, c)| *c)
            .sum()
    }

    /// Counts of 2-vote over, 1-vote over, 1-vote under and 2-vote under
    /// discrepancies, at bassort values `0, a/2, 3a/2, 2a`.
    #[must_use]
    pub fn plurality_counts(&self) -> [usize; 4] {
        let a = self.noerror;
        [
            self.count_near(0.0),
            self.count_near(0.5 * a),
            self.count_near(1.5 * a),
            self.count_near(2.0 * a),
        ]
    }

    /// Observed plurality discrepancy rates over the draws seen so far.
    #[must_use]
    pub fn plurality_error_rates(&self) -> ErrorRates {
        if self.samples == 0 {
            return ErrorRates::ZERO;
        }
        let n = self.samples as f64;
        let [p2o, p1o, p1u, p2u] = self.plurality_counts().map(|c| c as f64 / n);
        ErrorRates {
            p2o,
            p1o,
            p1u,
            p2u,
        }
    }

    /// Counts restricted to canonical discrepancy values, sorted by value.
    #[must_use]
    pub fn measured_counts(&self) -> ClcaErrorCounts {
        let mut errors: Vec<(f64, usize)> = self
            .counts
            .iter()
            .copied()
            .filter(|(value, _)| self.taus.is_clca_error(value / self.noerror))
            .collect();
        errors.sort_by(|a, b| a.0.total_cmp(&b.0));
        ClcaErrorCounts::new(errors, self.samples, self.noerror, self.upper)
    }
}
