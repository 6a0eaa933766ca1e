//! Incremental mean/variance accumulator (Welford 1962).
//!
//! ## Mathematical Foundation
//!
//! For each new value `x`:
//!
//! ```text
//! count += 1
//! delta  = x - mean
//! mean  += delta / count
//! M2    += delta * (x - mean)
//! ```
//!
//! Population variance is `M2 / count`, sample variance `M2 / (count - 1)`.
//! The update is numerically stable and O(1) per value.
//!
//! ## Key Invariants
//!
//! 1. `count` only grows; there is no reset within one test run.
//! 2. `variance()` is 0 before the first update.

use serde::{Deserialize, Serialize};

/// Running mean and variance over an append-only sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    /// Sum of squared differences from the running mean (M2).
    sum_squared_diffs: f64,
}

impl RunningStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one value into the accumulator.
    pub fn update(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.sum_squared_diffs += delta * delta2;
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance, 0 when empty.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_squared_diffs / self.count as f64
        }
    }

    /// `(mean, variance, sample_variance)`, all zero with fewer than 2 values.
    #[must_use]
    pub fn result(&self) -> (f64, f64, f64) {
        if self.count < 2 {
            return (0.0, 0.0, 0.0);
        }
        let n = self.count as f64;
        (
            self.mean,
            self.sum_squared_diffs / n,
            self.sum_squared_diffs / (n - 1.0),
        )
    }
}
