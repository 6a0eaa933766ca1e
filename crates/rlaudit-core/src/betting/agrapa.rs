//! aGRAPA: approximate growth-rate adaptive bet (Waudby-Smith & Ramdas 2021).
//!
//! ## Mathematical Foundation
//!
//! With `m` the mean and `σ²` the variance of previous draws and `µ` the
//! null mean of the remaining population,
//!
//! ```text
//! λ_raw = (m - µ) / (σ² + (m - µ)²)
//! c_j   = c0 + (c_max - c0) · (1 - 1/(1 + c_grow·√j))
//! λ_j   = clamp(λ_raw, 0, c_j / µ)
//! ```
//!
//! The first draw uses the caller's initial guess λ0.

use crate::error::{Result, require};
use crate::population::population_mean_under_null;
use crate::tracker::SampleTracker;

use super::BettingFn;

#[derive(Debug, Clone, PartialEq)]
pub struct AgrapaBet {
    population_size: usize,
    without_replacement: bool,
    /// Accepted for symmetry with the other strategies; the bet does not
    /// depend on it.
    upper_bound: f64,
    lam0: f64,
    c0: f64,
    c_max: f64,
    c_grow: f64,
}

impl AgrapaBet {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        population_size: usize,
        without_replacement: bool,
        upper_bound: f64,
        lam0: f64,
        c0: f64,
        c_max: f64,
        c_grow: f64,
    ) -> Result<Self> {
        require(c0 > 0.0 && c0 < 1.0, "c0", c0, "must lie in (0, 1)")?;
        require(c_max >= c0 && c_max < 1.0, "c_max", c_max, "must lie in [c0, 1)")?;
        require(c_grow >= 0.0, "c_grow", c_grow, "must be >= 0")?;
        require(lam0 >= 0.0, "lam0", lam0, "must be >= 0")?;
        Ok(Self {
            population_size,
            without_replacement,
            upper_bound,
            lam0,
            c0,
            c_max,
            c_grow,
        })
    }

    #[must_use]
    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }
}

impl BettingFn for AgrapaBet {
    fn bet(&mut self, prev: &SampleTracker) -> f64 {
        let j = prev.count();
        if j == 0 {
            return self.lam0;
        }
        let t_adj = population_mean_under_null(self.population_size, self.without_replacement, prev);
        let mean_diff = prev.mean() - t_adj;
        let lam_raw = mean_diff / (prev.variance() + mean_diff * mean_diff);
        let c = self.c0
            + (self.c_max - self.c0) * (1.0 - 1.0 / (1.0 + self.c_grow * (j as f64).sqrt()));
        lam_raw.min(c / t_adj).max(0.0)
    }
}
