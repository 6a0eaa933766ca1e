//! Kelly-optimal betting fractions for comparison audits.
//!
//! ## Mathematical Foundation
//!
//! A betting martingale multiplies its wealth by `1 + λ(x - µ)` per draw.
//! When the draw distribution is known (or estimated) as a set of
//! `(value, rate)` pairs, the growth-optimal λ maximizes
//!
//! ```text
//! E[ln T] = Σ rate_k · ln(1 + λ(v_k - µ))
//! ```
//!
//! For plurality comparison audits the values are the five canonical
//! bassort values `{0, a/2, a, 3a/2, 2a}` with rates
//! `(p2o, p1o, p0, p1u, p2u)`, `p0 = 1 - Σ p`. There is no closed form once
//! more than one error class is present, so the objective is maximized
//! numerically over a bounded interval.
//!
//! ## Key Invariants
//!
//! 1. Terms with zero rate contribute nothing, even where their logarithm
//!    is undefined.
//! 2. The search interval ends at [`stake_cap`]`(µ)`, so the worst outcome
//!    (a draw of 0, factor `1 - λµ`) never stakes the whole wealth, whatever
//!    rates the caller supplies.

use crate::error::{AuditError, Result};
use crate::error_rates::ErrorRates;
use crate::optimize::{BrentMaximizer, Optimum, ScalarMaximizer, SolverError};

/// Upper end of the λ search for [`OptimalLambda`].
pub const MAX_LAMBDA: f64 = 2.0;

/// Largest share of wealth staked on a draw of 0.
pub const MAX_STAKE: f64 = 1.0 - 1.0e-6;

/// Largest λ whose worst-case factor `1 - λµ` stays at least `1 - MAX_STAKE`.
#[must_use]
pub fn stake_cap(mui: f64) -> f64 {
    if mui > 0.0 {
        MAX_STAKE / mui
    } else {
        MAX_LAMBDA
    }
}

fn log_growth(rate: f64, lam: f64, value: f64, mui: f64) -> f64 {
    if rate == 0.0 {
        return 0.0;
    }
    let factor = 1.0 + lam * (value - mui);
    if factor <= 0.0 {
        f64::NEG_INFINITY
    } else {
        rate * factor.ln()
    }
}

/// Kelly solver over the five plurality bassort values.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimalLambda {
    /// No-error bassort value `a`.
    noerror: f64,
    rates: ErrorRates,
    mui: f64,
    p0: f64,
}

impl OptimalLambda {
    pub fn new(noerror: f64, rates: ErrorRates, mui: f64) -> Result<Self> {
        if !(mui > 0.0) {
            return Err(AuditError::InvalidParameter {
                name: "mui",
                value: mui,
                reason: "must be > 0",
            });
        }
        let p0 = 1.0 - rates.sum();
        if p0 < 0.0 {
            return Err(AuditError::InvalidKellyRates(rates.sum()));
        }
        Ok(Self {
            noerror,
            rates,
            mui,
            p0,
        })
    }

    /// Implied no-error rate.
    #[must_use]
    pub fn p0(&self) -> f64 {
        self.p0
    }

    #[must_use]
    pub fn expected_value_log_t(&self, lam: f64) -> f64 {
        let a = self.noerror;
        let mu = self.mui;
        let r = &self.rates;
        log_growth(self.p0, lam, a, mu)
            + log_growth(r.p2o, lam, 0.0, mu)
            + log_growth(r.p1o, lam, 0.5 * a, mu)
            + log_growth(r.p1u, lam, 1.5 * a, mu)
            + log_growth(r.p2u, lam, 2.0 * a, mu)
    }

    /// λ maximizing expected log growth over `[0, min(2, stake_cap(µ))]`.
    pub fn solve(&self) -> std::result::Result<f64, SolverError> {
        self.solve_with(&BrentMaximizer::default())
            .map(|opt| opt.point)
    }

    pub fn solve_with(
        &self,
        maximizer: &dyn ScalarMaximizer,
    ) -> std::result::Result<Optimum, SolverError> {
        let hi = MAX_LAMBDA.min(stake_cap(self.mui));
        maximizer.maximize(&|lam| self.expected_value_log_t(lam), 0.0, hi)
    }
}

/// Kelly solver over an arbitrary set of `(bassort value, rate)` pairs, with
/// optional pooled-batch values for audits that mix CVRs and batch totals.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralOptimalLambda {
    noerror: f64,
    rates: Vec<(f64, f64)>,
    pool_rates: Vec<(f64, f64)>,
    mui: f64,
    max_bet: f64,
    p0: f64,
}

impl GeneralOptimalLambda {
    pub fn new(
        noerror: f64,
        rates: Vec<(f64, f64)>,
        pool_rates: Option<Vec<(f64, f64)>>,
        mui: f64,
        max_bet: f64,
    ) -> Result<Self> {
        if !(mui > 0.0) {
            return Err(AuditError::InvalidParameter {
                name: "mui",
                value: mui,
                reason: "must be > 0",
            });
        }
        if !(max_bet > 0.0) {
            return Err(AuditError::InvalidParameter {
                name: "max_bet",
                value: max_bet,
                reason: "must be > 0",
            });
        }
        let pool_rates = pool_rates.unwrap_or_default();
        let total: f64 = rates.iter().chain(pool_rates.iter()).map(|(_, r)| r).sum();
        let p0 = 1.0 - total;
        if p0 < 0.0 {
            return Err(AuditError::InvalidKellyRates(total));
        }
        Ok(Self {
            noerror,
            rates,
            pool_rates,
            mui,
            max_bet,
            p0,
        })
    }

    #[must_use]
    pub fn p0(&self) -> f64 {
        self.p0
    }

    #[must_use]
    pub fn expected_value_log_t(&self, lam: f64) -> f64 {
        let noerror_term = log_growth(self.p0, lam, self.noerror, self.mui);
        self.rates
            .iter()
            .chain(self.pool_rates.iter())
            .fold(noerror_term, |acc, (value, rate)| {
                acc + log_growth(*rate, lam, *value, self.mui)
            })
    }

    /// λ maximizing expected log growth over `[0, min(max_bet, stake_cap(µ))]`.
    pub fn solve(&self) -> std::result::Result<f64, SolverError> {
        self.solve_with(&BrentMaximizer::default())
            .map(|opt| opt.point)
    }

    pub fn solve_with(
        &self,
        maximizer: &dyn ScalarMaximizer,
    ) -> std::result::Result<Optimum, SolverError> {
        let hi = self.max_bet.min(stake_cap(self.mui));
        maximizer.maximize(&|lam| self.expected_value_log_t(lam), 0.0, hi)
    }
}
