//! Kelly betting over every canonical discrepancy value.
//!
//! Generalizes [`super::AdaptiveComparison`] to assorters whose upper bound
//! is not 1 (seven canonical values instead of five) and to audits where part
//! of the population is only known as pooled batch totals.
//!
//! Each non-agreement bassort value gets its own shrink-truncate rate
//! estimate. The pooled share of the population contributes a fixed set of
//! `(value, rate)` pairs, and the card-level rates are scaled down by the
//! unpooled fraction so the two add up to one population.

use serde::{Deserialize, Serialize};

use crate::error::{Result, require};
use crate::error_rates::ClcaErrorCounts;
use crate::kelly::{GeneralOptimalLambda, stake_cap};
use crate::population::population_mean_under_null;
use crate::tracker::SampleTracker;

use super::{BettingFn, LastBet};

/// Assort-value distribution of the pooled part of a population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolRates {
    /// Cards covered by pools.
    pub total_in_pools: usize,
    /// (assort value, rate over the whole population).
    pub rates: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct GeneralAdaptiveBetting {
    population_size: usize,
    /// Counts from earlier rounds, folded into every estimate.
    starting: ClcaErrorCounts,
    phantoms: usize,
    pool_rates: Option<PoolRates>,
    d: usize,
    /// Largest fraction of wealth staked on the worst outcome, in (0, 1].
    max_risk: f64,
    without_replacement: bool,
    last: LastBet,
}

impl GeneralAdaptiveBetting {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        population_size: usize,
        starting: ClcaErrorCounts,
        phantoms: usize,
        pool_rates: Option<PoolRates>,
        d: usize,
        max_risk: f64,
        without_replacement: bool,
    ) -> Result<Self> {
        require(
            max_risk > 0.0 && max_risk <= 1.0,
            "max_risk",
            max_risk,
            "must lie in (0, 1]",
        )?;
        require(
            starting.noerror() > 0.0,
            "noerror",
            starting.noerror(),
            "must be > 0",
        )?;
        if let Some(pools) = &pool_rates {
            require(
                pools.total_in_pools <= population_size,
                "total_in_pools",
                pools.total_in_pools as f64,
                "must not exceed the population size",
            )?;
        }
        Ok(Self {
            population_size,
            starting,
            phantoms,
            pool_rates,
            d,
            max_risk,
            without_replacement,
            last: LastBet::new(),
        })
    }

    fn noerror(&self) -> f64 {
        self.starting.noerror()
    }

    fn scale(&self) -> f64 {
        match &self.pool_rates {
            Some(pools) if self.population_size > 0 => {
                (self.population_size - pools.total_in_pools) as f64 / self.population_size as f64
            }
            _ => 1.0,
        }
    }

    /// Shrink toward zero; a class never seen stays at zero.
    fn shrink_trunc(&self, count: usize, samples: usize) -> f64 {
        if samples == 0 || count == 0 {
            return 0.0;
        }
        let used = self.d.min(1);
        count as f64 / ((used + samples) as f64 - 1.0)
    }

    /// Estimated rate for every canonical discrepancy value after `prev`.
    #[must_use]
    pub fn estimated_rates(&self, prev: &SampleTracker) -> Vec<(f64, f64)> {
        let tally = prev.error_tally();
        let samples = self.starting.total_samples() + tally.map_or(0, |t| t.samples());
        let scale = self.scale();
        let phantom_floor = if self.population_size == 0 {
            0.0
        } else {
            self.phantoms as f64 / self.population_size as f64
        };
        let noerror = self.noerror();

        self.starting
            .bassort_values()
            .into_iter()
            .filter(|value| (value - noerror).abs() > f64::EPSILON * noerror)
            .map(|value| {
                let count = self.starting.count_of(value) + tally.map_or(0, |t| t.count_near(value));
                let mut rate = scale * self.shrink_trunc(count, samples);
                if self.starting.is_phantom(value) {
                    rate = rate.max(phantom_floor);
                }
                (value, rate)
            })
            .collect()
    }
}

impl BettingFn for GeneralAdaptiveBetting {
    fn bet(&mut self, prev: &SampleTracker) -> f64 {
        let rates = self.estimated_rates(prev);
        let mui = population_mean_under_null(self.population_size, self.without_replacement, prev);
        let pools = self.pool_rates.as_ref().map(|p| p.rates.clone());
        let solved = GeneralOptimalLambda::new(self.noerror(), rates, pools, mui, self.max_risk / mui)
            .map_err(|_| ())
            .and_then(|kelly| kelly.solve().map_err(|_| ()));
        self.last.resolve(solved).min(stake_cap(mui))
    }

    fn error_tally(&self) -> Option<(f64, f64)> {
        Some((self.starting.noerror(), self.starting.upper()))
    }

    fn reset(&mut self) {
        self.last.clear();
    }
}
