//! Bounded univariate maximization.
//!
//! The Kelly solvers depend only on [`ScalarMaximizer`]; [`BrentMaximizer`]
//! is the default backend.
//!
//! ## Mathematical Foundation
//!
//! Brent's method (Brent 1973, ch. 5) keeps a bracketing interval `[a, b]`
//! and the three best points seen so far. Each step tries a parabola through
//! those points and falls back to a golden-section step whenever the
//! parabolic step is not well inside the bracket or fails to shrink fast
//! enough. Convergence is declared when
//! `|x - m| <= 2·tol - (b - a)/2` with `tol = rel·|x| + abs`.
//!
//! ## Key Invariants
//!
//! 1. The endpoints are never evaluated; every trial point is strictly inside
//!    `(lo, hi)`.
//! 2. The number of objective evaluations is bounded by `max_evaluations`,
//!    so the solver cannot hang.

use thiserror::Error;

/// `(3 - √5) / 2`
const GOLDEN_SECTION: f64 = 0.381_966_011_250_105_1;

/// Failure of the optimizer seam. Recoverable by construction: callers fall
/// back to a previously valid answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("no convergence within {0} evaluations")]
    MaxEvaluations(usize),
    #[error("empty search interval [{lo}, {hi}]")]
    EmptyInterval { lo: f64, hi: f64 },
    #[error("objective is not finite at the optimum {0}")]
    NonFinite(f64),
}

/// Point and objective value at the located maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Optimum {
    pub point: f64,
    pub value: f64,
    pub evaluations: usize,
}

/// "Maximize a scalar function over an interval".
pub trait ScalarMaximizer {
    fn maximize(
        &self,
        objective: &dyn Fn(f64) -> f64,
        lo: f64,
        hi: f64,
    ) -> Result<Optimum, SolverError>;
}

/// Brent's parabolic-interpolation / golden-section optimizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrentMaximizer {
    rel_tol: f64,
    abs_tol: f64,
    max_evaluations: usize,
}

impl BrentMaximizer {
    /// Default relative tolerance.
    pub const REL_TOL: f64 = 1.0e-6;
    /// Default absolute tolerance.
    pub const ABS_TOL: f64 = 1.0e-6;
    /// Default evaluation budget.
    pub const MAX_EVALUATIONS: usize = 1000;

    #[must_use]
    pub fn new(rel_tol: f64, abs_tol: f64, max_evaluations: usize) -> Self {
        Self {
            rel_tol: rel_tol.max(2.0 * f64::EPSILON),
            abs_tol: abs_tol.max(f64::MIN_POSITIVE),
            max_evaluations: max_evaluations.max(1),
        }
    }
}

impl Default for BrentMaximizer {
    fn default() -> Self {
        Self::new(Self::REL_TOL, Self::ABS_TOL, Self::MAX_EVALUATIONS)
    }
}

impl ScalarMaximizer for BrentMaximizer {
    fn maximize(
        &self,
        objective: &dyn Fn(f64) -> f64,
        lo: f64,
        hi: f64,
    ) -> Result<Optimum, SolverError> {
        if !(lo < hi) {
            return Err(SolverError::EmptyInterval { lo, hi });
        }
        // Minimize the negation; NaN counts as the worst possible value.
        let mut evaluations = 0usize;
        let mut eval = |x: f64| -> Result<f64, SolverError> {
            if evaluations >= self.max_evaluations {
                return Err(SolverError::MaxEvaluations(self.max_evaluations));
            }
            evaluations += 1;
            let y = -objective(x);
            Ok(if y.is_nan() { f64::INFINITY } else { y })
        };

        let (mut a, mut b) = (lo, hi);
        let mut x = 0.5 * (lo + hi);
        let (mut v, mut w) = (x, x);
        let mut d = 0.0_f64;
        let mut e = 0.0_f64;
        let mut fx = eval(x)?;
        let (mut fv, mut fw) = (fx, fx);
        let mut best = (x, fx);

        loop {
            let m = 0.5 * (a + b);
            let tol1 = self.rel_tol * x.abs() + self.abs_tol;
            let tol2 = 2.0 * tol1;

            if (x - m).abs() <= tol2 - 0.5 * (b - a) {
                break;
            }

            let mut golden = true;
            if e.abs() > tol1 {
                let mut r = (x - w) * (fx - fv);
                let mut q = (x - v) * (fx - fw);
                let mut p = (x - v) * q - (x - w) * r;
                q = 2.0 * (q - r);
                if q > 0.0 {
                    p = -p;
                } else {
                    q = -q;
                }
                r = e;
                e = d;
                if p > q * (a - x) && p < q * (b - x) && p.abs() < (0.5 * q * r).abs() {
                    d = p / q;
                    let u = x + d;
                    if u - a < tol2 || b - u < tol2 {
                        d = if x <= m { tol1 } else { -tol1 };
                    }
                    golden = false;
                }
            }
            if golden {
                e = if x < m { b - x } else { a - x };
                d = GOLDEN_SECTION * e;
            }

            let u = if d.abs() < tol1 {
                if d >= 0.0 { x + tol1 } else { x - tol1 }
            } else {
                x + d
            };
            let fu = eval(u)?;
            if fu < best.1 {
                best = (u, fu);
            }

            if fu <= fx {
                if u < x {
                    b = x;
                } else {
                    a = x;
                }
                v = w;
                fv = fw;
                w = x;
                fw = fx;
                x = u;
                fx = fu;
            } else {
                if u < x {
                    a = u;
                } else {
                    b = u;
                }
                if fu <= fw || w == x {
                    v = w;
                    fv = fw;
                    w = u;
                    fw = fu;
                } else if fu <= fv || v == x || v == w {
                    v = u;
                    fv = fu;
                }
            }
        }

        let (point, neg_value) = best;
        if !neg_value.is_finite() {
            return Err(SolverError::NonFinite(point));
        }
        Ok(Optimum {
            point,
            value: -neg_value,
            evaluations,
        })
    }
}
