//! Betting-martingale strategies: choose λ_j from previous draws.
//!
//! Each strategy is consulted once per draw, before the draw is revealed,
//! and sees only the [`SampleTracker`] of earlier draws. A strategy that
//! needs discrepancy counts declares it through [`BettingFn::error_tally`]
//! and the driver builds a tracker that keeps them.
//!
//! Strategies that solve for λ numerically never fail a draw: when the
//! solver gives up they reuse the last bet they produced, or
//! [`FALLBACK_BET`] before the first one.

mod agrapa;
mod comparison;
mod general;

pub use agrapa::AgrapaBet;
pub use comparison::{AdaptiveComparison, EstimAdapter, OptimalComparisonNoP1, OracleComparison};
pub use general::{GeneralAdaptiveBetting, PoolRates};

use crate::estim::Estimator;
use crate::tracker::SampleTracker;

/// Bet used when no valid bet has been produced yet. A zero bet leaves the
/// test statistic unchanged.
pub const FALLBACK_BET: f64 = 0.0;

/// Predictable betting fraction λ_j.
pub trait BettingFn {
    /// λ_j from the draws before j.
    fn bet(&mut self, prev: &SampleTracker) -> f64;

    /// `(noerror, assorter upper bound)` when the strategy reads discrepancy
    /// counts from the tracker.
    fn error_tally(&self) -> Option<(f64, f64)> {
        None
    }

    /// Forget per-run state before a new test run.
    fn reset(&mut self) {}
}

/// Constant λ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedBet {
    lam: f64,
}

impl FixedBet {
    #[must_use]
    pub fn new(lam: f64) -> Self {
        Self { lam }
    }
}

impl BettingFn for FixedBet {
    fn bet(&mut self, _prev: &SampleTracker) -> f64 {
        self.lam
    }
}

/// Remembers the last bet a solver produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LastBet(Option<f64>);

impl LastBet {
    pub(crate) const fn new() -> Self {
        Self(None)
    }

    /// Record a fresh solution, or fall back when there is none.
    pub(crate) fn resolve<E>(&mut self, solved: Result<f64, E>) -> f64 {
        match solved {
            Ok(lam) if lam.is_finite() => {
                self.0 = Some(lam);
                lam
            }
            _ => self.0.unwrap_or(FALLBACK_BET),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.0 = None;
    }
}

/// Closed set of betting strategies selectable from configuration.
#[derive(Debug, Clone)]
pub enum BettingStrategy {
    Fixed(FixedBet),
    Agrapa(AgrapaBet),
    OptimalComparisonNoP1(OptimalComparisonNoP1),
    AdaptiveComparison(AdaptiveComparison),
    Oracle(OracleComparison),
    GeneralAdaptive(GeneralAdaptiveBetting),
    Estim(EstimAdapter<Estimator>),
}

impl BettingStrategy {
    fn inner(&mut self) -> &mut dyn BettingFn {
        match self {
            Self::Fixed(b) => b,
            Self::Agrapa(b) => b,
            Self::OptimalComparisonNoP1(b) => b,
            Self::AdaptiveComparison(b) => b,
            Self::Oracle(b) => b,
            Self::GeneralAdaptive(b) => b,
            Self::Estim(b) => b,
        }
    }
}

impl BettingFn for BettingStrategy {
    fn bet(&mut self, prev: &SampleTracker) -> f64 {
        self.inner().bet(prev)
    }

    fn error_tally(&self) -> Option<(f64, f64)> {
        match self {
            Self::AdaptiveComparison(b) => b.error_tally(),
            Self::GeneralAdaptive(b) => b.error_tally(),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.inner().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::SolverError;

    #[test]
    fn fixed_bet_is_constant() {
        let mut bet = FixedBet::new(0.25);
        let mut tracker = SampleTracker::new();
        assert_eq!(bet.bet(&tracker), 0.25);
        tracker.add(0.0);
        assert_eq!(bet.bet(&tracker), 0.25);
        assert_eq!(bet.error_tally(), None);
    }

    #[test]
    fn last_bet_falls_back() {
        let mut last = LastBet::new();
        assert_eq!(last.resolve(Err(SolverError::MaxEvaluations(1))), FALLBACK_BET);
        assert_eq!(last.resolve::<SolverError>(Ok(1.3)), 1.3);
        assert_eq!(last.resolve(Err(SolverError::MaxEvaluations(1))), 1.3);
        assert_eq!(last.resolve::<SolverError>(Ok(f64::NAN)), 1.3);
        last.clear();
        assert_eq!(last.resolve(Err(SolverError::NonFinite(0.0))), FALLBACK_BET);
    }

    #[test]
    fn strategy_enum_forwards() {
        let mut strategy = BettingStrategy::Fixed(FixedBet::new(0.5));
        assert_eq!(strategy.bet(&SampleTracker::new()), 0.5);
        assert_eq!(strategy.error_tally(), None);
        strategy.reset();
    }
}
