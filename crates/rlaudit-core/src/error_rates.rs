//! Comparison-audit discrepancy model.
//!
//! A comparison draw is `bassort = τ · a` where `a` is the no-error value and
//! `τ = 1 - overstatement/u`. Only a handful of τ values are reachable, so
//! discrepancies are tallied per canonical τ.
//!
//! ## Canonical τ values
//!
//! | cvr - mvr      | τ        | name    | plurality alias |
//! |----------------|----------|---------|-----------------|
//! | winner-loser   | 0        | win-los | p2o             |
//! | winner-other   | 1/2u     | win-oth | p1o             |
//! | other-loser    | 1-1/2u   | oth-los |                 |
//! | agreement      | 1        | noerror |                 |
//! | other-winner   | 2-1/2u   | oth-win |                 |
//! | loser-other    | 1+1/2u   | los-oth | p1u             |
//! | loser-winner   | 2        | los-win | p2u             |
//!
//! With `u = 1` the table collapses to five values `0, 1/2, 1, 3/2, 2`.
//! A phantom on both sides lands on `oth-los` (`p1o` when `u = 1`).

use serde::{Deserialize, Serialize};

use crate::assorter::{ClcaAssorter, Cvr};
use crate::error::{AuditError, Result};
use crate::numeric::double_is_close;
use crate::tracker::SampleTracker;

const NAMES5: [&str; 5] = ["p2o", "p1o", "noerror", "p1u", "p2u"];
const NAMES7: [&str; 7] = [
    "win-los", "win-oth", "oth-los", "noerror", "oth-win", "los-oth", "los-win",
];
const ALIASES: [(&str, &str); 4] = [
    ("p2o", "win-los"),
    ("p1o", "win-oth"),
    ("p1u", "los-oth"),
    ("p2u", "los-win"),
];

/// Canonical τ values for an assorter upper bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Taus {
    values: Vec<f64>,
    names: &'static [&'static str],
}

impl Taus {
    #[must_use]
    pub fn new(upper: f64) -> Self {
        if upper == 1.0 {
            return Self {
                values: vec![0.0, 0.5, 1.0, 1.5, 2.0],
                names: &NAMES5,
            };
        }
        let u12 = 1.0 / (2.0 * upper);
        Self {
            values: vec![0.0, u12, 1.0 - u12, 1.0, 2.0 - u12, 1.0 + u12, 2.0],
            names: &NAMES7,
        }
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn names(&self) -> &[&'static str] {
        self.names
    }

    /// Name of the canonical value close to `tau`, or `"unknown"`.
    #[must_use]
    pub fn name_of(&self, tau: f64) -> &'static str {
        self.values
            .iter()
            .position(|v| double_is_close(*v, tau))
            .map_or("unknown", |idx| self.names[idx])
    }

    /// Value for a name or plurality alias.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<f64> {
        let lookup = |wanted: &str| {
            self.names
                .iter()
                .position(|n| *n == wanted)
                .map(|idx| self.values[idx])
        };
        lookup(name).or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| *alias == name)
                .and_then(|(_, canonical)| lookup(canonical))
        })
    }

    /// True for any canonical value other than agreement.
    #[must_use]
    pub fn is_clca_error(&self, tau: f64) -> bool {
        !matches!(self.name_of(tau), "noerror" | "unknown")
    }

    /// True for the τ produced by a phantom record.
    #[must_use]
    pub fn is_phantom(&self, tau: f64) -> bool {
        matches!(self.name_of(tau), "oth-los" | "p1o")
    }
}

/// Plurality discrepancy rates `(p2o, p1o, p1u, p2u)`.
///
/// The residual `1 - sum()` is the no-error rate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorRates {
    /// 2-vote overstatements (bassort 0).
    pub p2o: f64,
    /// 1-vote overstatements (bassort a/2).
    pub p1o: f64,
    /// 1-vote understatements (bassort 3a/2).
    pub p1u: f64,
    /// 2-vote understatements (bassort 2a).
    pub p2u: f64,
}

impl ErrorRates {
    pub const ZERO: Self = Self {
        p2o: 0.0,
        p1o: 0.0,
        p1u: 0.0,
        p2u: 0.0,
    };

    /// Validated constructor; every rate must lie in `[0, 1]`.
    pub fn new(p2o: f64, p1o: f64, p1u: f64, p2u: f64) -> Result<Self> {
        for (name, value) in [("p2o", p2o), ("p1o", p1o), ("p1u", p1u), ("p2u", p2u)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AuditError::InvalidRate { name, value });
            }
        }
        Ok(Self {
            p2o,
            p1o,
            p1u,
            p2u,
        })
    }

    pub fn from_list(list: &[f64]) -> Result<Self> {
        match list {
            [p2o, p1o, p1u, p2u] => Self::new(*p2o, *p1o, *p1u, *p2u),
            _ => Err(AuditError::InvalidParameter {
                name: "rates.len",
                value: list.len() as f64,
                reason: "expected 4 rates",
            }),
        }
    }

    #[must_use]
    pub fn to_list(&self) -> [f64; 4] {
        [self.p2o, self.p1o, self.p1u, self.p2u]
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.to_list().iter().sum()
    }

    #[must_use]
    pub fn are_zero(&self) -> bool {
        self.to_list().iter().all(|r| *r == 0.0)
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        Self::new(
            self.p2o + other.p2o,
            self.p1o + other.p1o,
            self.p1u + other.p1u,
            self.p2u + other.p2u,
        )
    }

    /// Map bassort value -> rate for no-error value `noerror`.
    #[must_use]
    pub fn error_rates(&self, noerror: f64) -> [(f64, f64); 4] {
        [
            (0.0, self.p2o),
            (0.5 * noerror, self.p1o),
            (1.5 * noerror, self.p1u),
            (2.0 * noerror, self.p2u),
        ]
    }

    /// Rates from bassort-value counts over `n` samples.
    #[must_use]
    pub fn from_counts(counts: &[(f64, usize)], noerror: f64, n: usize) -> Self {
        if n == 0 {
            return Self::ZERO;
        }
        let find = |target: f64| {
            counts
                .iter()
                .find(|(value, _)| double_is_close(*value, target))
                .map_or(0, |(_, count)| *count) as f64
                / n as f64
        };
        Self {
            p2o: find(0.0),
            p1o: find(0.5 * noerror),
            p1u: find(1.5 * noerror),
            p2u: find(2.0 * noerror),
        }
    }
}

/// Discrepancy counts keyed by bassort value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClcaErrorCounts {
    counts: Vec<(f64, usize)>,
    total_samples: usize,
    noerror: f64,
    upper: f64,
}

impl ClcaErrorCounts {
    #[must_use]
    pub fn new(counts: Vec<(f64, usize)>, total_samples: usize, noerror: f64, upper: f64) -> Self {
        Self {
            counts,
            total_samples,
            noerror,
            upper,
        }
    }

    #[must_use]
    pub fn empty(noerror: f64, upper: f64) -> Self {
        Self::new(Vec::new(), 0, noerror, upper)
    }

    /// Counts implied by plurality rates over `total_samples` draws
    /// (assorter upper bound 1).
    #[must_use]
    pub fn from_plurality_error_rates(rates: &ErrorRates, noerror: f64, total_samples: usize) -> Self {
        let counts = rates
            .error_rates(noerror)
            .iter()
            .map(|(value, rate)| (*value, (rate * total_samples as f64).round() as usize))
            .collect();
        Self::new(counts, total_samples, noerror, 1.0)
    }

    /// Inverse of [`Self::from_plurality_error_rates`], up to rounding.
    #[must_use]
    pub fn to_plurality_error_rates(&self) -> ErrorRates {
        ErrorRates::from_counts(&self.counts, self.noerror, self.total_samples)
    }

    #[must_use]
    pub fn counts(&self) -> &[(f64, usize)] {
        &self.counts
    }

    #[must_use]
    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    #[must_use]
    pub fn noerror(&self) -> f64 {
        self.noerror
    }

    #[must_use]
    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Count recorded for `value`, 0 when absent.
    #[must_use]
    pub fn count_of(&self, value: f64) -> usize {
        self.counts
            .iter()
            .find(|(v, _)| double_is_close(*v, value))
            .map_or(0, |(_, c)| *c)
    }

    /// bassort value -> observed rate.
    #[must_use]
    pub fn error_rates(&self) -> Vec<(f64, f64)> {
        self.counts
            .iter()
            .map(|(value, count)| {
                let rate = if self.total_samples == 0 {
                    0.0
                } else {
                    *count as f64 / self.total_samples as f64
                };
                (*value, rate)
            })
            .collect()
    }

    /// All canonical bassort values for this `noerror`/`upper`, ascending.
    #[must_use]
    pub fn bassort_values(&self) -> Vec<f64> {
        let mut values: Vec<f64> = Taus::new(self.upper)
            .values()
            .iter()
            .map(|tau| tau * self.noerror)
            .collect();
        values.sort_by(f64::total_cmp);
        values
    }

    /// Fraction of samples carrying any canonical discrepancy.
    #[must_use]
    pub fn clca_error_rate(&self) -> f64 {
        if self.total_samples == 0 {
            return 0.0;
        }
        let taus = Taus::new(self.upper);
        let errors: usize = self
            .counts
            .iter()
            .filter(|(value, _)| taus.is_clca_error(value / self.noerror))
            .map(|(_, c)| *c)
            .sum();
        errors as f64 / self.total_samples as f64
    }

    #[must_use]
    pub fn is_phantom(&self, bassort: f64) -> bool {
        Taus::new(self.upper).is_phantom(bassort / self.noerror)
    }
}

/// Per-candidate-count discrepancy rates observed in simulation, divided by
/// the fuzz percentage that produced them.
const SIMULATED_RATES: [[f64; 4]; 9] = [
    [0.2623686, 0.2625469, 0.2371862, 0.2370315],
    [0.1400744, 0.3492912, 0.3168304, 0.1245060],
    [0.1277999, 0.3913025, 0.3519773, 0.1157800],
    [0.0692904, 0.3496153, 0.3077332, 0.0600383],
    [0.0553841, 0.3398728, 0.2993941, 0.0473467],
    [0.0334778, 0.2815991, 0.2397504, 0.0259392],
    [0.0351272, 0.3031122, 0.2591883, 0.0280541],
    [0.0308620, 0.3042787, 0.2585768, 0.0254916],
    [0.0276966, 0.2946918, 0.2517076, 0.0225628],
];

/// A-priori discrepancy rates for planning comparison audits.
pub struct ClcaErrorTable;

impl ClcaErrorTable {
    /// Rates used when nothing is known about the vote-counting process.
    pub const STANDARD: ErrorRates = ErrorRates {
        p2o: 0.01,
        p1o: 1.0e-4,
        p1u: 0.01,
        p2u: 1.0e-4,
    };

    fn row(ncandidates: usize) -> [f64; 4] {
        SIMULATED_RATES[ncandidates.clamp(2, 10) - 2]
    }

    /// Rates for a contest with `ncandidates`, scaled by `fuzz_pct`;
    /// [`Self::STANDARD`] when no fuzz is given.
    pub fn error_rates(ncandidates: usize, fuzz_pct: Option<f64>) -> Result<ErrorRates> {
        match fuzz_pct {
            None => Ok(Self::STANDARD),
            Some(fuzz) => {
                let [p2o, p1o, p1u, p2u] = Self::row(ncandidates).map(|r| r * fuzz);
                ErrorRates::new(p2o, p1o, p1u, p2u)
            }
        }
    }

    /// Fuzz percentage implied by each observed rate.
    #[must_use]
    pub fn fuzz_pct(ncandidates: usize, rates: &ErrorRates) -> [f64; 4] {
        let row = Self::row(ncandidates);
        let observed = rates.to_list();
        std::array::from_fn(|i| observed[i] / row[i])
    }

    /// Observed rates when auditing `pairs` of (mvr, cvr) records for the
    /// assorter's contest.
    pub fn calc_error_rates(cassorter: &ClcaAssorter, pairs: &[(Cvr, Cvr)]) -> Result<ErrorRates> {
        let mut tracker = SampleTracker::with_error_tally(cassorter.noerror(), 1.0);
        let contest = cassorter.contest();
        for (mvr, cvr) in pairs.iter().filter(|(mvr, _)| mvr.has_contest(contest)) {
            tracker.add(cassorter.bassort(mvr, cvr)?);
        }
        Ok(tracker
            .error_tally()
            .map_or(ErrorRates::ZERO, |tally| tally.plurality_error_rates()))
    }
}
