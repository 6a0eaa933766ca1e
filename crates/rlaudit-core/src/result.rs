//! Outcome of one sequential test run.

use serde::{Deserialize, Serialize};

/// Terminal state of a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestH0Status {
    /// `p < α`: the reported outcome is confirmed.
    StatRejectNull,
    /// The sample budget ran out before the test could reject.
    LimitReached,
    /// ALPHA: the drawn mass alone exceeds `N/2`.
    SampleSumExceeds,
    /// Betting: the drawn mass alone exceeds `N/2`, or the whole population
    /// was examined and its mean is above 1/2.
    SampleSumRejectNull,
    /// The remaining population can no longer reach `N/2`.
    AcceptNull,
}

impl TestH0Status {
    /// True when the audit did not confirm the reported outcome.
    #[must_use]
    pub const fn is_fail(self) -> bool {
        matches!(self, Self::LimitReached | Self::AcceptNull)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StatRejectNull => "stat_reject_null",
            Self::LimitReached => "limit_reached",
            Self::SampleSumExceeds => "sample_sum_exceeds",
            Self::SampleSumRejectNull => "sample_sum_reject_null",
            Self::AcceptNull => "accept_null",
        }
    }

    /// Every status, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::StatRejectNull,
        Self::LimitReached,
        Self::SampleSumExceeds,
        Self::SampleSumRejectNull,
        Self::AcceptNull,
    ];
}

impl std::fmt::Display for TestH0Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of `test_h0`. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub status: TestH0Status,
    /// Draws taken, including one that ended the run on a boundary.
    pub sample_count: usize,
    /// Mean of the draws folded into the test statistic.
    pub sample_mean: f64,
    /// `1/T_j` after each incorporated draw.
    pub pvalues: Vec<f64>,
    /// η_j for ALPHA, λ_j for betting, one per incorporated draw.
    pub auxiliary: Vec<f64>,
}

impl TestResult {
    /// Last recorded p-value, 1 when nothing was incorporated.
    #[must_use]
    pub fn pvalue_last(&self) -> f64 {
        self.pvalues.last().copied().unwrap_or(1.0)
    }

    /// Smallest recorded p-value, 1 when nothing was incorporated.
    #[must_use]
    pub fn pvalue_min(&self) -> f64 {
        self.pvalues.iter().copied().fold(1.0, f64::min)
    }

    /// Compact snapshot without the per-draw series.
    #[must_use]
    pub fn summary(&self) -> TestSummary {
        TestSummary {
            status: self.status,
            sample_count: self.sample_count,
            sample_mean: self.sample_mean,
            pvalue_last: self.pvalue_last(),
            pvalue_min: self.pvalue_min(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub status: TestH0Status,
    pub sample_count: usize,
    pub sample_mean: f64,
    pub pvalue_last: f64,
    pub pvalue_min: f64,
}

/// Per-draw sequences, collected only when tracing is on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceCollector {
    pub xs: Vec<f64>,
    pub mus: Vec<f64>,
    /// η_j (ALPHA) or λ_j (betting).
    pub params: Vec<f64>,
    pub tjs: Vec<f64>,
    pub test_statistics: Vec<f64>,
}

impl TraceCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, x: f64, mu: f64, param: f64, tj: f64, statistic: f64) {
        self.xs.push(x);
        self.mus.push(mu);
        self.params.push(param);
        self.tjs.push(tj);
        self.test_statistics.push(statistic);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_statuses() {
        let failing: Vec<_> = TestH0Status::ALL.into_iter().filter(|s| s.is_fail()).collect();
        assert_eq!(failing, vec![TestH0Status::LimitReached, TestH0Status::AcceptNull]);
    }

    #[test]
    fn status_serializes_snake_case() {
        for status in TestH0Status::ALL {
            let json = serde_json::to_string(&status).expect("serialize");
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn pvalue_accessors() {
        let result = TestResult {
            status: TestH0Status::LimitReached,
            sample_count: 3,
            sample_mean: 0.5,
            pvalues: vec![0.8, 0.4, 0.6],
            auxiliary: vec![0.0; 3],
        };
        assert_eq!(result.pvalue_last(), 0.6);
        assert_eq!(result.pvalue_min(), 0.4);
        let summary = result.summary();
        assert_eq!(summary.sample_count, 3);
        assert_eq!(summary.pvalue_min, 0.4);

        let empty = TestResult {
            pvalues: Vec::new(),
            ..result
        };
        assert_eq!(empty.pvalue_last(), 1.0);
    }
}
