//! Betting strategies for card-level comparison audits.
//!
//! Comparison draws concentrate on the no-error value `a`, with rare
//! discrepancies at `0, a/2, 3a/2, 2a`. The strategies here either use a
//! closed form that ignores most discrepancy classes, or estimate every
//! class rate and hand them to the Kelly solver.
//!
//! ## Rate estimation (COBRA §4.2)
//!
//! Per class `k` with prior rate `p̃_k` and weight `d_k`:
//!
//! ```text
//! p̂_k = max(ε, (d_k·p̃_k + count_k) / (d_k + j - 1))   capped at 1
//! ```
//!
//! A negative prior removes the class from consideration.

use crate::error::{AuditError, Result, require};
use crate::error_rates::ErrorRates;
use crate::estim::{EstimFn, OptimalBettingEstimator};
use crate::kelly::{OptimalLambda, stake_cap};
use crate::numeric::eta_to_lam;
use crate::population::population_mean_under_null;
use crate::tracker::SampleTracker;

use super::{BettingFn, FALLBACK_BET, LastBet};

/// Floor applied to every estimated discrepancy rate.
pub const RATE_FLOOR: f64 = 1.0e-5;

/// λ equivalent of [`OptimalBettingEstimator`]: assumes no 1-vote
/// overstatements and a 2-vote overstatement rate `p2`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimalComparisonNoP1 {
    population_size: usize,
    without_replacement: bool,
    upper_bound: f64,
    eta: f64,
}

impl OptimalComparisonNoP1 {
    pub fn new(
        population_size: usize,
        without_replacement: bool,
        upper_bound: f64,
        p2: f64,
    ) -> Result<Self> {
        require(upper_bound > 1.0, "upper_bound", upper_bound, "must be > 1")?;
        let eta = OptimalBettingEstimator::new(upper_bound, p2)?.value();
        Ok(Self {
            population_size,
            without_replacement,
            upper_bound,
            eta,
        })
    }
}

impl BettingFn for OptimalComparisonNoP1 {
    fn bet(&mut self, prev: &SampleTracker) -> f64 {
        let mu = population_mean_under_null(self.population_size, self.without_replacement, prev);
        eta_to_lam(self.eta, mu, self.upper_bound)
    }
}

/// Any ALPHA estimator used as a betting strategy through `λ = (η/µ - 1)/(u - µ)`.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimAdapter<E> {
    population_size: usize,
    without_replacement: bool,
    upper_bound: f64,
    estimator: E,
}

impl<E: EstimFn> EstimAdapter<E> {
    pub fn new(
        population_size: usize,
        without_replacement: bool,
        upper_bound: f64,
        estimator: E,
    ) -> Result<Self> {
        require(upper_bound > 1.0, "upper_bound", upper_bound, "must be > 1")?;
        Ok(Self {
            population_size,
            without_replacement,
            upper_bound,
            estimator,
        })
    }
}

impl<E: EstimFn> BettingFn for EstimAdapter<E> {
    fn bet(&mut self, prev: &SampleTracker) -> f64 {
        let mu = population_mean_under_null(self.population_size, self.without_replacement, prev);
        let eta = self.estimator.eta(prev);
        if mu >= self.upper_bound || eta >= self.upper_bound {
            return FALLBACK_BET;
        }
        eta_to_lam(eta, mu, self.upper_bound)
    }
}

/// Constant Kelly bet for known discrepancy rates, solved once at µ = 1/2.
///
/// Each draw is still held to [`stake_cap`] at the current µ, since the
/// constant can exceed it once µ climbs above 1/2.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleComparison {
    population_size: usize,
    without_replacement: bool,
    lam: f64,
}

impl OracleComparison {
    pub fn new(
        population_size: usize,
        without_replacement: bool,
        noerror: f64,
        rates: ErrorRates,
    ) -> Result<Self> {
        let kelly = OptimalLambda::new(noerror, rates, 0.5)?;
        let lam = LastBet::new().resolve(kelly.solve());
        Ok(Self {
            population_size,
            without_replacement,
            lam,
        })
    }

    #[must_use]
    pub fn lambda(&self) -> f64 {
        self.lam
    }
}

impl BettingFn for OracleComparison {
    fn bet(&mut self, prev: &SampleTracker) -> f64 {
        let mu = population_mean_under_null(self.population_size, self.without_replacement, prev);
        self.lam.min(stake_cap(mu))
    }
}

/// Kelly bet on shrink-truncate estimates of the four plurality
/// discrepancy rates.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveComparison {
    population_size: usize,
    without_replacement: bool,
    /// Bassort upper bound; no bet is placed once µ reaches it.
    upper_bound: f64,
    noerror: f64,
    /// Prior weight for the 1-vote classes.
    d1: usize,
    /// Prior weight for the 2-vote classes.
    d2: usize,
    /// A-priori rates; a negative rate drops that class.
    apriori: [f64; 4],
    last: LastBet,
}

impl AdaptiveComparison {
    /// `upper_bound` is the bassort upper bound `2·noerror`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        population_size: usize,
        without_replacement: bool,
        upper_bound: f64,
        noerror: f64,
        d1: usize,
        d2: usize,
        apriori: [f64; 4],
    ) -> Result<Self> {
        require(upper_bound > 1.0, "upper_bound", upper_bound, "must be > 1")?;
        require(noerror > 0.5, "noerror", noerror, "must be > 0.5")?;
        for (name, p) in ["p2o", "p1o", "p1u", "p2u"].into_iter().zip(apriori) {
            if p > 1.0 {
                return Err(AuditError::InvalidRate { name, value: p });
            }
        }
        Ok(Self {
            population_size,
            without_replacement,
            upper_bound,
            noerror,
            d1,
            d2,
            apriori,
            last: LastBet::new(),
        })
    }

    /// Same weight for every class, priors from `rates`.
    pub fn with_rates(
        population_size: usize,
        without_replacement: bool,
        noerror: f64,
        d: usize,
        rates: ErrorRates,
    ) -> Result<Self> {
        Self::new(
            population_size,
            without_replacement,
            2.0 * noerror,
            noerror,
            d,
            d,
            rates.to_list(),
        )
    }

    /// Shrink-truncate estimates `(p2o, p1o, p1u, p2u)` after `prev`.
    ///
    /// Before the first draw these are the (floored) priors, not zero.
    #[must_use]
    pub fn estimated_rates(&self, prev: &SampleTracker) -> ErrorRates {
        let j = prev.count();
        let counts = prev
            .error_tally()
            .map_or([0; 4], |tally| tally.plurality_counts());
        let weights = [self.d2, self.d1, self.d1, self.d2];
        let [p2o, p1o, p1u, p2u] = std::array::from_fn(|k| {
            estimate_rate(weights[k], self.apriori[k], counts[k], j)
        });
        ErrorRates {
            p2o,
            p1o,
            p1u,
            p2u,
        }
    }
}

/// `max(ε, (d·p̃ + count)/(d + j - 1))`, at most 1; the prior itself before
/// the first draw, 0 for a dropped class.
fn estimate_rate(d: usize, apriori: f64, count: usize, j: usize) -> f64 {
    if apriori < 0.0 {
        return 0.0;
    }
    if j == 0 {
        return apriori.max(RATE_FLOOR).min(1.0);
    }
    let denom = ((d + j) as f64 - 1.0).max(1.0);
    let est = (d as f64 * apriori + count as f64) / denom;
    est.max(RATE_FLOOR).min(1.0)
}

impl BettingFn for AdaptiveComparison {
    fn bet(&mut self, prev: &SampleTracker) -> f64 {
        let mui = population_mean_under_null(self.population_size, self.without_replacement, prev);
        if mui >= self.upper_bound {
            return FALLBACK_BET;
        }
        let rates = self.estimated_rates(prev);
        let solved = OptimalLambda::new(self.noerror, rates, mui)
            .map_err(|_| ())
            .and_then(|kelly| kelly.solve().map_err(|_| ()));
        // a carried-over bet was sized for an earlier µ
        self.last.resolve(solved).min(stake_cap(mui))
    }

    fn error_tally(&self) -> Option<(f64, f64)> {
        Some((self.noerror, 1.0))
    }

    fn reset(&mut self) {
        self.last.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betting_mart::BettingMart;
    use crate::config::TestConfig;
    use crate::estim::FixedEstimator;
    use crate::result::TestH0Status;
    use crate::sample::SampleFromList;

    #[test]
    fn optimal_comparison_matches_closed_form_at_half() {
        for margin in [0.02, 0.05, 0.1, 0.3] {
            for p2 in [0.0001, 0.001, 0.01] {
                let a = 1.0 / (2.0 - margin);
                let mut bet = OptimalComparisonNoP1::new(1000, false, 2.0 * a, p2).expect("valid");
                let lam = bet.bet(&SampleTracker::new());
                let expected = (2.0 - 4.0 * a * (1.0 - p2)) / (1.0 - 2.0 * a);
                assert!(
                    (lam - expected).abs() < 1e-8,
                    "margin={margin} p2={p2} lam={lam} expected={expected}"
                );
            }
        }
    }

    #[test]
    fn optimal_comparison_requires_upper_above_one() {
        assert!(OptimalComparisonNoP1::new(100, true, 1.0, 0.001).is_err());
    }

    #[test]
    fn estim_adapter_converts_eta() {
        let mut bet = EstimAdapter::new(100, false, 1.2, FixedEstimator::new(0.6)).expect("valid");
        let lam = bet.bet(&SampleTracker::new());
        assert!((lam - (0.6 / 0.5 - 1.0) / 0.7).abs() < 1e-15);
        let mut above = EstimAdapter::new(100, false, 1.2, FixedEstimator::new(1.3)).expect("valid");
        assert_eq!(above.bet(&SampleTracker::new()), FALLBACK_BET);
        assert!(EstimAdapter::new(100, false, 1.0, FixedEstimator::new(0.6)).is_err());
    }

    #[test]
    fn oracle_is_constant_kelly() {
        let a = 1.0 / (2.0 - 0.05);
        let rates = ErrorRates::new(0.001, 0.01, 0.0, 0.0).expect("valid");
        let mut oracle = OracleComparison::new(10_000, true, a, rates).expect("valid");
        let direct = OptimalLambda::new(a, rates, 0.5)
            .expect("valid")
            .solve()
            .expect("converges");
        assert_eq!(oracle.lambda(), direct);
        let mut tracker = SampleTracker::new();
        tracker.add(a);
        assert_eq!(oracle.bet(&tracker), direct);
    }

    #[test]
    fn oracle_without_two_vote_overstatements_stays_under_stake_cap() {
        let a = 1.0 / 1.2;
        let rates = ErrorRates::new(0.0, 0.0, 0.0, 0.0).expect("valid");
        let mut oracle = OracleComparison::new(10, true, a, rates).expect("valid");
        let mut tracker = SampleTracker::new();
        tracker.add(0.5 * a);
        let mu = population_mean_under_null(10, true, &tracker);
        assert!(mu > 0.5);
        let lam = oracle.bet(&tracker);
        assert!(lam * mu < 1.0, "lam={lam} mu={mu}");
    }

    #[test]
    fn adaptive_does_not_bet_once_mu_reaches_upper_bound() {
        let a = 1.0 / 1.2;
        let mut adaptive = AdaptiveComparison::with_rates(4, true, a, 100, low_priors()).expect("valid");
        let mut tracker = SampleTracker::with_error_tally(a, 1.0);
        for _ in 0..3 {
            tracker.add(0.0);
        }
        // µ = 2 / 1 = 2 > 2a
        assert!(population_mean_under_null(4, true, &tracker) > 2.0 * a);
        assert_eq!(adaptive.bet(&tracker), FALLBACK_BET);
    }

    #[test]
    fn dropped_two_vote_class_keeps_test_statistic_positive() {
        let a = 1.0 / 1.2;
        let config = TestConfig::new(0.05, 10, true, 2.0 * a).expect("valid");
        let adaptive =
            AdaptiveComparison::new(10, true, 2.0 * a, a, 100, 100, [-1.0, 1e-3, 1e-3, 1e-4])
                .expect("valid");
        let mut mart = BettingMart::new(adaptive, config).expect("valid");
        let mut source = SampleFromList::new(vec![0.5 * a, 0.0, a, a, a, a]);
        let result = mart.test_h0_from(6, false, &mut source).expect("runs");

        assert_eq!(result.sample_count, 6);
        assert!(
            result.pvalues.iter().all(|p| p.is_finite() && *p > 0.0),
            "{:?}",
            result.pvalues
        );
        // the draw of 0 lost nearly everything, and four clean draws can't win it back
        assert!(result.pvalues[1] > result.pvalues[0]);
        assert_ne!(result.status, TestH0Status::StatRejectNull);
        assert_eq!(result.status, TestH0Status::LimitReached);
    }

    #[test]
    fn rate_estimate_shrinks_toward_prior() {
        assert_eq!(estimate_rate(100, -1.0, 5, 10), 0.0);
        assert_eq!(estimate_rate(100, 0.01, 0, 0), 0.01);
        assert_eq!(estimate_rate(100, 0.0, 0, 10), RATE_FLOOR);
        let est = estimate_rate(100, 0.01, 5, 11);
        assert!((est - 6.0 / 110.0).abs() < 1e-15);
        assert_eq!(estimate_rate(0, 0.5, 3, 1), 1.0);
    }

    #[test]
    fn adaptive_bets_shrink_after_overstatements() {
        let a = 1.0 / (2.0 - 0.1);
        let mut adaptive =
            AdaptiveComparison::with_rates(10_000, true, a, 100, low_priors()).expect("valid");
        let (noerror, upper) = adaptive.error_tally().expect("tally");
        let mut tracker = SampleTracker::with_error_tally(noerror, upper);

        let first = adaptive.bet(&tracker);
        for _ in 0..20 {
            tracker.add(a);
        }
        let clean = adaptive.bet(&tracker);
        for _ in 0..3 {
            tracker.add(0.0);
        }
        let dirty = adaptive.bet(&tracker);
        assert!(first > 0.0 && clean > 0.0);
        assert!(dirty < clean, "dirty={dirty} clean={clean}");
        let est = adaptive.estimated_rates(&tracker);
        assert!(est.p2o > 0.01, "p2o={}", est.p2o);
    }

    fn low_priors() -> ErrorRates {
        ErrorRates::new(1.0e-4, 1.0e-3, 1.0e-3, 1.0e-4).expect("valid")
    }
}
