//! ALPHA-family estimators of the alternative mean η_j.
//!
//! ## Mathematical Foundation
//!
//! ALPHA (Stark 2023) bets that the population mean is η_j rather than µ_j.
//! Any predictable η_j in `(µ_j, u)` yields a valid test supermartingale, so
//! the estimator only affects power, never validity.
//!
//! **Shrink-truncate**: start at the prior η0 with weight `d`, move toward the
//! sample mean as draws accumulate, and never drop below
//! `µ_j + c/√(d+j)`:
//!
//! ```text
//! est   = (d·η0 + S) / (d + j)
//! η_j   = min(u(1-ε), max(est, µ_j + c/√(d+j)))
//! ```
//!
//! With a non-zero `f`, `est` is additionally pulled toward `u` in proportion
//! to `f/σ`, where σ is the sample standard deviation.

use crate::error::{AuditError, Result, require};
use crate::numeric::EPS;
use crate::population::population_mean_under_null;
use crate::tracker::SampleTracker;

/// Predictable estimate of the true population mean.
pub trait EstimFn {
    /// η_j from the draws before j.
    fn eta(&self, prev: &SampleTracker) -> f64;
}

/// Constant η0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedEstimator {
    eta0: f64,
}

impl FixedEstimator {
    #[must_use]
    pub fn new(eta0: f64) -> Self {
        Self { eta0 }
    }
}

impl EstimFn for FixedEstimator {
    fn eta(&self, _prev: &SampleTracker) -> f64 {
        self.eta0
    }
}

/// Shrink toward η0, truncate to a band above µ_j.
#[derive(Debug, Clone, PartialEq)]
pub struct ShrinkTruncEstimator {
    population_size: usize,
    without_replacement: bool,
    upper_bound: f64,
    /// Floor for the sample standard deviation.
    min_sd: f64,
    eta0: f64,
    /// Width of the truncation band above µ_j.
    c: f64,
    /// Weight of η0, in units of draws.
    d: usize,
    /// Pull toward `u` per unit of 1/σ.
    f: f64,
    cap_above: f64,
}

impl ShrinkTruncEstimator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        population_size: usize,
        without_replacement: bool,
        upper_bound: f64,
        min_sd: f64,
        eta0: f64,
        c: f64,
        d: usize,
        f: f64,
    ) -> Result<Self> {
        if !(upper_bound > 0.0) {
            return Err(AuditError::InvalidUpperBound(upper_bound));
        }
        require(c > 0.0, "c", c, "must be > 0")?;
        require(f >= 0.0, "f", f, "must be >= 0")?;
        require(min_sd >= 0.0, "min_sd", min_sd, "must be >= 0")?;
        Ok(Self {
            population_size,
            without_replacement,
            upper_bound,
            min_sd,
            eta0,
            c,
            d,
            f,
            cap_above: upper_bound * (1.0 - EPS),
        })
    }
}

impl EstimFn for ShrinkTruncEstimator {
    fn eta(&self, prev: &SampleTracker) -> f64 {
        let j = prev.count();
        let dj = (self.d + j) as f64;
        let weighted = (self.d as f64 * self.eta0 + prev.sum()) / dj;

        let est = if self.f == 0.0 {
            weighted
        } else {
            let (_, variance, _) = prev.stats().result();
            let sd = if j < 2 {
                1.0
            } else {
                variance.sqrt().max(self.min_sd)
            };
            (weighted + self.upper_bound * self.f / sd) / (1.0 + self.f / sd)
        };

        let mu = population_mean_under_null(self.population_size, self.without_replacement, prev);
        let cap_below = mu + self.c / dj.sqrt();
        est.max(cap_below).min(self.cap_above)
    }
}

/// Constant η that is optimal for a comparison audit with 2-vote
/// overstatement rate `p2` and no 1-vote overstatements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimalBettingEstimator {
    eta: f64,
}

impl OptimalBettingEstimator {
    /// `upper_bound` is the bassort upper bound `2·noerror`; it may not be 1.
    pub fn new(upper_bound: f64, p2: f64) -> Result<Self> {
        if !(upper_bound > 0.0) {
            return Err(AuditError::InvalidUpperBound(upper_bound));
        }
        require(upper_bound != 1.0, "upper_bound", upper_bound, "must differ from 1")?;
        require((0.0..=1.0).contains(&p2), "p2", p2, "must lie in [0, 1]")?;
        let u = upper_bound;
        let eta = (1.0 - u * (1.0 - p2)) / (2.0 - 2.0 * u) + u * (1.0 - p2) - 0.5;
        Ok(Self { eta })
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.eta
    }
}

impl EstimFn for OptimalBettingEstimator {
    fn eta(&self, _prev: &SampleTracker) -> f64 {
        self.eta
    }
}

/// Closed set of estimators selectable from configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Estimator {
    Fixed(FixedEstimator),
    ShrinkTrunc(ShrinkTruncEstimator),
    OptimalBetting(OptimalBettingEstimator),
}

impl EstimFn for Estimator {
    fn eta(&self, prev: &SampleTracker) -> f64 {
        match self {
            Self::Fixed(e) => e.eta(prev),
            Self::ShrinkTrunc(e) => e.eta(prev),
            Self::OptimalBetting(e) => e.eta(prev),
        }
    }
}

impl<E: EstimFn + ?Sized> EstimFn for &E {
    fn eta(&self, prev: &SampleTracker) -> f64 {
        (**self).eta(prev)
    }
}
