//! Betting martingale (Waudby-Smith & Ramdas 2021; ALPHA eq. 10).
//!
//! ## Mathematical Foundation
//!
//! ```text
//! t_j = 1 + λ_j (X_j - µ_j)
//! T_j = T_0 · Π t_i,   p_j = 1/T_j
//! ```
//!
//! `T_0` defaults to 1; a multi-round audit resumes by passing the previous
//! round's statistic.
//!
//! ## Key Invariants
//!
//! 1. µ_j is checked before λ_j is chosen or `X_j` is drawn. A µ_j outside
//!    `[0, u]` ends the run without consuming a draw.
//! 2. λ_j depends only on the tracker of previous draws.
//! 3. Having examined the whole population (`sample_count == N`) decides the
//!    outcome from the sample mean alone.

use crate::betting::BettingFn;
use crate::config::{TestConfig, TraceMode, trace_mode};
use crate::error::{AuditError, Result, require};
use crate::numeric::double_is_close;
use crate::population::{NULL_MEAN, population_mean_under_null};
use crate::result::{TestH0Status, TestResult, TraceCollector};
use crate::sample::SampleSource;
use crate::tracker::SampleTracker;

/// Sequential betting test of `H0: mean <= 1/2`.
#[derive(Debug, Clone)]
pub struct BettingMart<B> {
    betting: B,
    config: TestConfig,
    trace_mode: TraceMode,
    trace: Option<TraceCollector>,
}

impl<B: BettingFn> BettingMart<B> {
    /// The upper bound must exceed 1/2, or no draw could ever win a bet.
    pub fn new(betting: B, config: TestConfig) -> Result<Self> {
        config.validate()?;
        require(
            config.upper_bound > NULL_MEAN,
            "upper_bound",
            config.upper_bound,
            "must be > 0.5",
        )?;
        Ok(Self {
            betting,
            config,
            trace_mode: trace_mode(),
            trace: None,
        })
    }

    #[must_use]
    pub fn with_trace_mode(mut self, mode: TraceMode) -> Self {
        self.trace_mode = mode;
        self
    }

    #[must_use]
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    #[must_use]
    pub fn betting(&self) -> &B {
        &self.betting
    }

    #[must_use]
    pub fn trace(&self) -> Option<&TraceCollector> {
        self.trace.as_ref()
    }

    pub fn test_h0<F>(
        &mut self,
        max_samples: usize,
        terminate_on_null_reject: bool,
        mut draw: F,
    ) -> Result<TestResult>
    where
        F: FnMut() -> f64,
    {
        self.run(max_samples, terminate_on_null_reject, 1.0, || Ok(draw()))
    }

    /// As [`Self::test_h0`], starting from a statistic carried over from an
    /// earlier round.
    pub fn test_h0_resume<F>(
        &mut self,
        max_samples: usize,
        terminate_on_null_reject: bool,
        starting_test_statistic: f64,
        mut draw: F,
    ) -> Result<TestResult>
    where
        F: FnMut() -> f64,
    {
        require(
            starting_test_statistic > 0.0,
            "starting_test_statistic",
            starting_test_statistic,
            "must be > 0",
        )?;
        self.run(max_samples, terminate_on_null_reject, starting_test_statistic, || {
            Ok(draw())
        })
    }

    pub fn test_h0_from<S: SampleSource + ?Sized>(
        &mut self,
        max_samples: usize,
        terminate_on_null_reject: bool,
        source: &mut S,
    ) -> Result<TestResult> {
        self.run(max_samples, terminate_on_null_reject, 1.0, || source.sample())
    }

    fn run<D>(
        &mut self,
        max_samples: usize,
        terminate_on_null_reject: bool,
        starting_test_statistic: f64,
        mut draw: D,
    ) -> Result<TestResult>
    where
        D: FnMut() -> Result<f64>,
    {
        let TestConfig {
            risk_limit,
            population_size,
            without_replacement,
            upper_bound: u,
        } = self.config;
        if max_samples > population_size {
            return Err(AuditError::MaxSamplesExceedsPopulation {
                max_samples,
                population: population_size,
            });
        }

        self.betting.reset();
        let mut tracker = match self.betting.error_tally() {
            Some((noerror, upper)) => SampleTracker::with_error_tally(noerror, upper),
            None => SampleTracker::new(),
        };
        let mut trace = self.trace_mode.collects().then(TraceCollector::new);
        let mut pvalues = Vec::new();
        let mut bets = Vec::new();
        let mut statistic = starting_test_statistic;
        let mut pvalue_last = 1.0 / statistic;
        let mut mu = NULL_MEAN;
        let mut sample_count = 0;

        while sample_count < max_samples {
            mu = population_mean_under_null(population_size, without_replacement, &tracker);
            if mu > u || mu < 0.0 {
                break;
            }

            let lam = self.betting.bet(&tracker);
            let x = draw()?;
            if !(0.0..=u).contains(&x) {
                return Err(AuditError::SampleOutOfBounds {
                    index: sample_count,
                    value: x,
                    upper: u,
                });
            }
            sample_count += 1;

            let tj = betting_term(x, lam, mu, u);
            statistic *= tj;
            tracker.add(x);

            pvalue_last = 1.0 / statistic;
            pvalues.push(pvalue_last);
            bets.push(lam);
            if let Some(trace) = trace.as_mut() {
                trace.record(x, mu, lam, tj, statistic);
            }

            if terminate_on_null_reject && pvalue_last < risk_limit {
                break;
            }
        }

        let status = if sample_count == population_size {
            if tracker.mean() > NULL_MEAN {
                TestH0Status::SampleSumRejectNull
            } else {
                TestH0Status::AcceptNull
            }
        } else if pvalue_last < risk_limit {
            TestH0Status::StatRejectNull
        } else if mu > u {
            TestH0Status::AcceptNull
        } else if mu < 0.0 {
            TestH0Status::SampleSumRejectNull
        } else {
            TestH0Status::LimitReached
        };

        self.trace = trace;
        Ok(TestResult {
            status,
            sample_count,
            sample_mean: tracker.mean(),
            pvalues,
            auxiliary: bets,
        })
    }
}

fn betting_term(x: f64, lam: f64, mu: f64, u: f64) -> f64 {
    if double_is_close(0.0, mu) || double_is_close(u, mu) {
        return 1.0;
    }
    let tj = 1.0 + lam * (x - mu);
    if double_is_close(tj, 0.0) { 1.0 } else { tj }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betting::{AgrapaBet, BettingStrategy, FixedBet};

    fn cycle(xs: &[f64]) -> impl FnMut() -> f64 + '_ {
        let mut i = 0;
        move || {
            let x = xs[i % xs.len()];
            i += 1;
            x
        }
    }

    #[test]
    fn fixed_bet_closed_form() {
        for v in [0.75, 0.9] {
            for lam in [0.25, 0.5] {
                let config = TestConfig::new(0.05, 10_000, false, 1.0).expect("valid");
                let mut mart = BettingMart::new(FixedBet::new(lam), config).expect("valid");
                let result = mart.test_h0(20, false, || v).expect("runs");
                let expected = 1.0 / (1.0 + lam * (v - 0.5)).powi(20);
                assert_eq!(result.sample_count, 20);
                assert!(
                    (result.pvalue_last() - expected).abs() <= 1e-9 * expected,
                    "v={v} lam={lam}: {} vs {expected}",
                    result.pvalue_last()
                );
                assert!(result.auxiliary.iter().all(|b| *b == lam));
            }
        }
    }

    #[test]
    fn agrapa_reference_pvalues() {
        let xs = [0.75, 0.9, 0.9, 0.9, 0.75, 0.9, 0.9, 0.9, 0.9, 0.9];
        let bet = AgrapaBet::new(100, true, 1.0, 0.55, 0.6, 0.9, 2.0).expect("valid");
        let config = TestConfig::new(0.05, 100, false, 1.0).expect("valid");
        let mut mart = BettingMart::new(BettingStrategy::Agrapa(bet), config).expect("valid");
        let result = mart.test_h0(xs.len(), false, cycle(&xs)).expect("runs");

        let expected = [
            0.8791208791208791,
            0.5349895378315,
            0.32109370033107004,
            0.19101570133724538,
            0.13329007491004005,
            0.07834885187829466,
            0.045788936134473664,
            0.0266122688895355,
            0.015383111679525113,
            0.008844241319835962,
        ];
        assert_eq!(result.pvalues.len(), expected.len());
        for (a, e) in result.pvalues.iter().zip(expected) {
            assert!((a - e).abs() <= 1e-9 * e, "{a} vs {e}");
        }
        assert_eq!(result.status, TestH0Status::StatRejectNull);
        assert_eq!(result.auxiliary[0], 0.55);
    }

    #[test]
    fn terminates_on_first_rejection() {
        let config = TestConfig::new(0.05, 10_000, false, 1.0).expect("valid");
        let mut mart = BettingMart::new(FixedBet::new(1.0), config).expect("valid");
        let result = mart.test_h0(1000, true, || 1.0).expect("runs");
        // 1.5^8 > 20 > 1.5^7
        assert_eq!(result.status, TestH0Status::StatRejectNull);
        assert_eq!(result.sample_count, 8);
    }

    #[test]
    fn starting_statistic_is_folded_in() {
        let config = TestConfig::new(0.05, 10_000, false, 1.0).expect("valid");
        let mut fresh = BettingMart::new(FixedBet::new(0.5), config).expect("valid");
        let base = fresh.test_h0(5, false, || 0.8).expect("runs");
        let mut resumed = BettingMart::new(FixedBet::new(0.5), config).expect("valid");
        let carried = resumed.test_h0_resume(5, false, 4.0, || 0.8).expect("runs");
        for (b, c) in base.pvalues.iter().zip(&carried.pvalues) {
            assert!((b / 4.0 - c).abs() < 1e-15);
        }
        assert!(resumed.test_h0_resume(5, false, 0.0, || 0.8).is_err());
    }

    #[test]
    fn whole_population_decides() {
        let config = TestConfig::new(0.05, 20, true, 1.0).expect("valid");
        let mut mart = BettingMart::new(FixedBet::new(0.0), config).expect("valid");
        // µ reaches exactly 0 before the last draw, which is still taken
        let xs: Vec<f64> = [0.0, 1.0].repeat(9).into_iter().chain([1.0, 1.0]).collect();
        let result = mart.test_h0(20, false, cycle(&xs)).expect("runs");
        assert_eq!(result.sample_count, 20);
        assert!((result.sample_mean - 0.55).abs() < 1e-12);
        assert_eq!(result.status, TestH0Status::SampleSumRejectNull);

        let result = mart.test_h0(20, false, cycle(&[0.0, 1.0])).expect("runs");
        assert_eq!(result.sample_count, 20);
        assert_eq!(result.status, TestH0Status::AcceptNull);
    }

    #[test]
    fn null_mean_boundaries() {
        let config = TestConfig::new(0.05, 100, true, 1.0).expect("valid");
        let mut mart = BettingMart::new(FixedBet::new(0.01), config).expect("valid");

        // 51 ones push µ below zero before the 52nd draw is taken
        let result = mart.test_h0(100, false, || 1.0).expect("runs");
        assert_eq!(result.sample_count, 51);
        assert_eq!(result.status, TestH0Status::SampleSumRejectNull);

        let result = mart.test_h0(100, false, || 0.0).expect("runs");
        assert_eq!(result.sample_count, 51);
        assert_eq!(result.status, TestH0Status::AcceptNull);
    }

    #[test]
    fn bets_see_only_previous_draws() {
        struct Recorder(Vec<usize>);
        impl BettingFn for Recorder {
            fn bet(&mut self, prev: &SampleTracker) -> f64 {
                self.0.push(prev.count());
                0.5
            }
        }
        let config = TestConfig::new(0.05, 100, true, 1.0).expect("valid");
        let mut mart = BettingMart::new(Recorder(Vec::new()), config).expect("valid");
        mart.test_h0(4, false, || 0.7).expect("runs");
        assert_eq!(mart.betting().0, vec![0, 1, 2, 3]);
    }

    #[test]
    fn rejects_bad_draws_and_config() {
        let config = TestConfig::new(0.05, 100, true, 0.5).expect("valid");
        assert!(BettingMart::new(FixedBet::new(0.5), config).is_err());

        let config = TestConfig::new(0.05, 100, true, 1.0).expect("valid");
        let mut mart = BettingMart::new(FixedBet::new(0.5), config).expect("valid");
        assert!(matches!(
            mart.test_h0(10, false, || 2.0),
            Err(AuditError::SampleOutOfBounds { index: 0, .. })
        ));
        assert!(matches!(
            mart.test_h0(101, false, || 1.0),
            Err(AuditError::MaxSamplesExceedsPopulation { .. })
        ));
    }
}
