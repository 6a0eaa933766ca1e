//! Repeated-trial simulation of audits over synthetic populations.
//!
//! A [`SimulationConfig`] names a population, a test strategy and a trial
//! budget. [`run_repeated`] draws each trial from its own ChaCha20 stream,
//! seeded from `blake3(root_seed ‖ trial)`, so a report depends only on the
//! config and never on how many worker threads ran it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rlaudit_core::betting::{
    AdaptiveComparison, AgrapaBet, GeneralAdaptiveBetting, OptimalComparisonNoP1,
    OracleComparison,
};
use rlaudit_core::estim::{FixedEstimator, ShrinkTruncEstimator};
use rlaudit_core::{
    AlphaMart, Assorter, AuditError, BettingMart, BettingStrategy, ClcaAssorter, ClcaErrorCounts,
    Cvr, ErrorRates, Estimator, FixedBet, PluralityAssorter, SampleSource, TestConfig,
    TestResult, TestSummary, TraceMode,
};
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, StreamKind, TestKind};

const CONTEST: u32 = 1;
const WINNER: u32 = 1;
const LOSER: u32 = 2;
const OTHER: u32 = 3;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Synthetic population of assort values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PopulationConfig {
    /// Ballot-polling: cards for the winner, the loser, and anyone else.
    Polling { winner_share: f64, loser_share: f64 },
    /// Card-level comparison: CVRs with the given reported margin, and
    /// manual records that disagree at the given discrepancy rates.
    Comparison {
        reported_margin: f64,
        #[serde(default)]
        rates: ErrorRates,
    },
}

/// Test statistic and strategy for every trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// ALPHA with the shrink-truncate estimator. `eta0` defaults to the
    /// reported assorter mean.
    ShrinkTrunc {
        #[serde(default)]
        eta0: Option<f64>,
        #[serde(default = "default_c")]
        c: f64,
        #[serde(default = "default_d")]
        d: usize,
        #[serde(default)]
        f: f64,
        #[serde(default = "default_min_sd")]
        min_sd: f64,
    },
    /// ALPHA with a constant η.
    FixedEta { eta0: f64 },
    /// Betting martingale with a constant λ.
    FixedBet { lambda: f64 },
    Agrapa {
        #[serde(default)]
        lam0: f64,
        #[serde(default = "default_c0")]
        c0: f64,
        #[serde(default = "default_c_max")]
        c_max: f64,
        #[serde(default = "default_c_grow")]
        c_grow: f64,
    },
    AdaptiveComparison {
        #[serde(default = "default_d")]
        d: usize,
        #[serde(default = "default_priors")]
        priors: ErrorRates,
    },
    /// Kelly-optimal bet for the population's true discrepancy rates.
    Oracle,
    OptimalComparison { p2: f64 },
    GeneralAdaptive {
        #[serde(default = "default_d")]
        d: usize,
        #[serde(default = "default_max_risk")]
        max_risk: f64,
    },
}

fn default_c() -> f64 {
    0.1
}

fn default_d() -> usize {
    100
}

fn default_min_sd() -> f64 {
    1.0e-6
}

fn default_c0() -> f64 {
    0.5
}

fn default_c_max() -> f64 {
    0.9
}

fn default_c_grow() -> f64 {
    0.0
}

fn default_max_risk() -> f64 {
    0.9
}

fn default_priors() -> ErrorRates {
    ErrorRates {
        p2o: 1.0e-4,
        p1o: 1.0e-3,
        p1u: 1.0e-3,
        p2u: 1.0e-4,
    }
}

impl StrategyConfig {
    /// Stable snake_case name used in logs and reports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShrinkTrunc { .. } => "shrink_trunc",
            Self::FixedEta { .. } => "fixed_eta",
            Self::FixedBet { .. } => "fixed_bet",
            Self::Agrapa { .. } => "agrapa",
            Self::AdaptiveComparison { .. } => "adaptive_comparison",
            Self::Oracle => "oracle",
            Self::OptimalComparison { .. } => "optimal_comparison",
            Self::GeneralAdaptive { .. } => "general_adaptive",
        }
    }

    #[must_use]
    pub fn test_kind(&self) -> TestKind {
        match self {
            Self::ShrinkTrunc { .. } | Self::FixedEta { .. } => TestKind::Alpha,
            _ => TestKind::Betting,
        }
    }
}

/// Everything needed to reproduce a batch of simulated audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub trials: usize,
    #[serde(default)]
    pub seed: u64,
    /// Worker threads; 0 uses the available parallelism.
    #[serde(default)]
    pub threads: usize,
    pub population_size: usize,
    #[serde(default = "default_risk_limit")]
    pub risk_limit: f64,
    #[serde(default = "default_without_replacement")]
    pub without_replacement: bool,
    /// Draw budget per trial; defaults to the population size.
    #[serde(default)]
    pub max_samples: Option<usize>,
    pub population: PopulationConfig,
    pub strategy: StrategyConfig,
}

fn default_risk_limit() -> f64 {
    0.05
}

fn default_without_replacement() -> bool {
    true
}

impl SimulationConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(HarnessError::InvalidConfig("trials must be > 0".into()));
        }
        if let Some(max) = self.max_samples
            && (max == 0 || max > self.population_size)
        {
            return Err(HarnessError::InvalidConfig(format!(
                "max_samples {max} must lie in [1, {}]",
                self.population_size
            )));
        }
        // Population and strategy checks run through the core constructors.
        let population = Population::build(self)?;
        self.build_driver(&population)?;
        Ok(())
    }

    fn max_samples(&self) -> usize {
        self.max_samples.unwrap_or(self.population_size)
    }

    fn worker_count(&self) -> usize {
        let threads = if self.threads == 0 {
            std::thread::available_parallelism().map_or(1, usize::from)
        } else {
            self.threads
        };
        threads.clamp(1, self.trials)
    }

    fn build_driver(&self, population: &Population) -> Result<Driver> {
        let n = self.population_size;
        let wor = self.without_replacement;
        let u = population.upper_bound;
        let config = TestConfig::new(self.risk_limit, n, wor, u)?;

        let alpha = |estimator: Estimator| -> Result<Driver> {
            let mart = AlphaMart::new(estimator, config)?.with_trace_mode(TraceMode::Off);
            Ok(Driver::Alpha(mart))
        };
        let betting = |strategy: BettingStrategy| -> Result<Driver> {
            let mart = BettingMart::new(strategy, config)?.with_trace_mode(TraceMode::Off);
            Ok(Driver::Betting(mart))
        };

        match &self.strategy {
            StrategyConfig::ShrinkTrunc {
                eta0,
                c,
                d,
                f,
                min_sd,
            } => alpha(Estimator::ShrinkTrunc(ShrinkTruncEstimator::new(
                n,
                wor,
                u,
                *min_sd,
                eta0.unwrap_or(population.reported_mean),
                *c,
                *d,
                *f,
            )?)),
            StrategyConfig::FixedEta { eta0 } => alpha(Estimator::Fixed(FixedEstimator::new(*eta0))),
            StrategyConfig::FixedBet { lambda } => {
                betting(BettingStrategy::Fixed(FixedBet::new(*lambda)))
            }
            StrategyConfig::Agrapa {
                lam0,
                c0,
                c_max,
                c_grow,
            } => betting(BettingStrategy::Agrapa(AgrapaBet::new(
                n, wor, u, *lam0, *c0, *c_max, *c_grow,
            )?)),
            StrategyConfig::AdaptiveComparison { d, priors } => {
                let noerror = population.require_noerror(self.strategy.name())?;
                betting(BettingStrategy::AdaptiveComparison(
                    AdaptiveComparison::with_rates(n, wor, noerror, *d, *priors)?,
                ))
            }
            StrategyConfig::Oracle => {
                let noerror = population.require_noerror(self.strategy.name())?;
                betting(BettingStrategy::Oracle(OracleComparison::new(
                    n,
                    wor,
                    noerror,
                    population.rates,
                )?))
            }
            StrategyConfig::OptimalComparison { p2 } => betting(
                BettingStrategy::OptimalComparisonNoP1(OptimalComparisonNoP1::new(n, wor, u, *p2)?),
            ),
            StrategyConfig::GeneralAdaptive { d, max_risk } => {
                let noerror = population.require_noerror(self.strategy.name())?;
                let starting = ClcaErrorCounts::empty(noerror, population.assorter_upper);
                betting(BettingStrategy::GeneralAdaptive(GeneralAdaptiveBetting::new(
                    n, starting, 0, None, *d, *max_risk, wor,
                )?))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

/// Materialized assort values plus the facts strategies need about them.
#[derive(Debug, Clone)]
struct Population {
    values: Vec<f64>,
    upper_bound: f64,
    /// Upper bound of the underlying assorter, not of the bassort values.
    assorter_upper: f64,
    reported_mean: f64,
    /// Set for comparison populations only.
    noerror: Option<f64>,
    rates: ErrorRates,
}

impl Population {
    fn build(config: &SimulationConfig) -> Result<Self> {
        let n = config.population_size;
        if n == 0 {
            return Err(AuditError::EmptyPopulation.into());
        }
        match config.population {
            PopulationConfig::Polling {
                winner_share,
                loser_share,
            } => {
                let winners = share_count(winner_share, n, "winner_share")?;
                let losers = share_count(loser_share, n, "loser_share")?;
                if winners + losers > n {
                    return Err(HarnessError::InvalidConfig(
                        "winner_share + loser_share exceeds 1".into(),
                    ));
                }
                let margin = (winners as f64 - losers as f64) / n as f64;
                let assorter = PluralityAssorter::new(CONTEST, WINNER, LOSER, (margin + 1.0) / 2.0)?;
                let values = (0..n)
                    .map(|i| {
                        let candidate = if i < winners {
                            WINNER
                        } else if i < winners + losers {
                            LOSER
                        } else {
                            OTHER
                        };
                        let card = Cvr::new(format!("card-{i}")).with_votes(CONTEST, &[candidate]);
                        assorter.assort(&card, false)
                    })
                    .collect();
                Ok(Self {
                    values,
                    upper_bound: assorter.upper_bound(),
                    assorter_upper: assorter.upper_bound(),
                    reported_mean: assorter.diluted_mean(),
                    noerror: None,
                    rates: ErrorRates::ZERO,
                })
            }
            PopulationConfig::Comparison {
                reported_margin,
                rates,
            } => {
                let rates = ErrorRates::new(rates.p2o, rates.p1o, rates.p1u, rates.p2u)?;
                let assorter = PluralityAssorter::new(
                    CONTEST,
                    WINNER,
                    LOSER,
                    (reported_margin + 1.0) / 2.0,
                )?;
                let assorter_upper = assorter.upper_bound();
                let clca = ClcaAssorter::new(assorter, true)?;
                let noerror = clca.noerror();

                let mut values = Vec::with_capacity(n);
                for (bassort, rate) in rates.error_rates(noerror) {
                    let count = share_count(rate, n, "rates")?;
                    values.extend(std::iter::repeat_n(bassort, count));
                }
                if values.len() > n {
                    return Err(HarnessError::InvalidConfig(
                        "discrepancy rates sum past 1".into(),
                    ));
                }
                values.resize(n, noerror);
                Ok(Self {
                    values,
                    upper_bound: clca.upper_bound(),
                    assorter_upper,
                    reported_mean: noerror,
                    noerror: Some(noerror),
                    rates,
                })
            }
        }
    }

    fn require_noerror(&self, strategy: &str) -> Result<f64> {
        self.noerror.ok_or_else(|| {
            HarnessError::InvalidConfig(format!("{strategy} needs a comparison population"))
        })
    }
}

fn share_count(share: f64, n: usize, name: &str) -> Result<usize> {
    if !(0.0..=1.0).contains(&share) {
        return Err(HarnessError::InvalidConfig(format!(
            "{name} {share} outside [0, 1]"
        )));
    }
    Ok((share * n as f64).round() as usize)
}

/// Samples a population in a seeded random order.
///
/// Without replacement the population is shuffled once and read in order;
/// with replacement every draw picks a uniform index.
#[derive(Debug, Clone)]
pub struct PermutedPopulation {
    values: Vec<f64>,
    rng: ChaCha20Rng,
    without_replacement: bool,
    next: usize,
}

impl PermutedPopulation {
    #[must_use]
    pub fn new(mut values: Vec<f64>, seed: u64, without_replacement: bool) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        if without_replacement {
            values.shuffle(&mut rng);
        }
        Self {
            values,
            rng,
            without_replacement,
            next: 0,
        }
    }
}

impl SampleSource for PermutedPopulation {
    fn sample(&mut self) -> rlaudit_core::Result<f64> {
        if self.values.is_empty() {
            return Err(AuditError::SourceExhausted(self.next));
        }
        let index = if self.without_replacement {
            self.next
        } else {
            self.rng.gen_range(0..self.values.len())
        };
        let value = self
            .values
            .get(index)
            .copied()
            .ok_or(AuditError::SourceExhausted(self.next))?;
        self.next += 1;
        Ok(value)
    }

    fn reset(&mut self) {
        self.next = 0;
    }

    fn population_size(&self) -> usize {
        self.values.len()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

enum Driver {
    Alpha(AlphaMart<Estimator>),
    Betting(BettingMart<BettingStrategy>),
}

impl Driver {
    fn run(
        &mut self,
        max_samples: usize,
        source: &mut PermutedPopulation,
    ) -> rlaudit_core::Result<TestResult> {
        match self {
            Self::Alpha(mart) => mart.test_h0_from(max_samples, true, source),
            Self::Betting(mart) => mart.test_h0_from(max_samples, true, source),
        }
    }
}

// ---------------------------------------------------------------------------
// Repeated trials
// ---------------------------------------------------------------------------

/// Seed for one trial: the first 8 bytes of `blake3(root ‖ trial)`.
#[must_use]
pub fn trial_seed(root: u64, trial: usize) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&root.to_le_bytes());
    hasher.update(&(trial as u64).to_le_bytes());
    let hash = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial: usize,
    pub seed: u64,
    pub summary: TestSummary,
}

/// Aggregate report over all trials, in trial order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRepeatedResult {
    pub strategy: String,
    pub trials: usize,
    pub status_counts: BTreeMap<String, usize>,
    /// Share of trials that would escalate.
    pub fail_fraction: f64,
    pub mean_sample_count: f64,
    pub median_sample_count: usize,
    pub p90_sample_count: usize,
    pub max_sample_count: usize,
    pub records: Vec<TrialRecord>,
}

impl RunRepeatedResult {
    fn from_records(strategy: &str, records: Vec<TrialRecord>) -> Self {
        let trials = records.len();
        let mut status_counts = BTreeMap::new();
        let mut fails = 0;
        for record in &records {
            *status_counts
                .entry(record.summary.status.as_str().to_string())
                .or_insert(0) += 1;
            if record.summary.status.is_fail() {
                fails += 1;
            }
        }
        let mut counts: Vec<usize> = records.iter().map(|r| r.summary.sample_count).collect();
        counts.sort_unstable();
        let total: usize = counts.iter().sum();
        Self {
            strategy: strategy.to_string(),
            trials,
            status_counts,
            fail_fraction: fails as f64 / trials.max(1) as f64,
            mean_sample_count: total as f64 / trials.max(1) as f64,
            median_sample_count: nearest_rank(&counts, 0.5),
            p90_sample_count: nearest_rank(&counts, 0.9),
            max_sample_count: counts.last().copied().unwrap_or(0),
            records,
        }
    }

    pub fn count_of(&self, status: &str) -> usize {
        self.status_counts.get(status).copied().unwrap_or(0)
    }
}

fn nearest_rank(sorted: &[usize], q: f64) -> usize {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Run `config.trials` independent audits across worker threads.
pub fn run_repeated(config: &SimulationConfig) -> Result<RunRepeatedResult> {
    config.validate()?;
    let population = Population::build(config)?;
    let max_samples = config.max_samples();
    let next_trial = AtomicUsize::new(0);
    let records = Mutex::new(Vec::with_capacity(config.trials));
    let first_error: Mutex<Option<HarnessError>> = Mutex::new(None);

    std::thread::scope(|scope| -> Result<()> {
        let population = &population;
        let next_trial = &next_trial;
        let records = &records;
        let first_error = &first_error;
        let handles: Vec<_> = (0..config.worker_count())
            .map(|_| {
                scope.spawn(move || {
                    let mut driver = match config.build_driver(population) {
                        Ok(driver) => driver,
                        Err(e) => {
                            first_error.lock().get_or_insert(e);
                            return;
                        }
                    };
                    loop {
                        let trial = next_trial.fetch_add(1, Ordering::Relaxed);
                        if trial >= config.trials || first_error.lock().is_some() {
                            break;
                        }
                        let seed = trial_seed(config.seed, trial);
                        let mut source = PermutedPopulation::new(
                            population.values.clone(),
                            seed,
                            config.without_replacement,
                        );
                        match driver.run(max_samples, &mut source) {
                            Ok(result) => records.lock().push(TrialRecord {
                                trial,
                                seed,
                                summary: result.summary(),
                            }),
                            Err(e) => {
                                first_error.lock().get_or_insert(e.into());
                                break;
                            }
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().map_err(|_| HarnessError::WorkerPanicked)?;
        }
        Ok(())
    })?;

    if let Some(e) = first_error.into_inner() {
        return Err(e);
    }
    let mut records = records.into_inner();
    records.sort_by_key(|r| r.trial);
    Ok(RunRepeatedResult::from_records(config.strategy.name(), records))
}

/// Write `run_start`, one `trial_end` per trial, and `run_end`.
pub fn emit_trial_logs(
    config: &SimulationConfig,
    result: &RunRepeatedResult,
    emitter: &mut LogEmitter,
) -> std::io::Result<()> {
    let kind = config.strategy.test_kind();
    let start = LogEntry::new("", LogLevel::Info, "run_start")
        .with_stream(StreamKind::Simulation)
        .with_test(kind, result.strategy.as_str())
        .with_risk_limit(config.risk_limit)
        .with_details(serde_json::json!({
            "trials": config.trials,
            "seed": config.seed,
            "population_size": config.population_size,
            "without_replacement": config.without_replacement,
        }));
    emitter.emit_entry(start)?;

    for record in &result.records {
        let level = if record.summary.status.is_fail() {
            LogLevel::Warn
        } else {
            LogLevel::Info
        };
        let entry = LogEntry::new("", level, "trial_end")
            .with_stream(StreamKind::Simulation)
            .with_test(kind, result.strategy.as_str())
            .with_trial(record.trial)
            .with_summary(&record.summary)
            .with_risk_limit(config.risk_limit)
            .with_details(serde_json::json!({ "seed": record.seed }));
        emitter.emit_entry(entry)?;
    }

    let end = LogEntry::new("", LogLevel::Info, "run_end")
        .with_stream(StreamKind::Simulation)
        .with_test(kind, result.strategy.as_str())
        .with_details(serde_json::json!({
            "status_counts": result.status_counts,
            "fail_fraction": result.fail_fraction,
            "mean_sample_count": result.mean_sample_count,
        }));
    emitter.emit_entry(end)?;
    emitter.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlaudit_core::{BettingFn, SampleTracker, TestH0Status};

    fn polling_config() -> SimulationConfig {
        SimulationConfig {
            trials: 8,
            seed: 12_345,
            threads: 2,
            population_size: 2_000,
            risk_limit: 0.05,
            without_replacement: true,
            max_samples: None,
            population: PopulationConfig::Polling {
                winner_share: 0.6,
                loser_share: 0.2,
            },
            strategy: StrategyConfig::ShrinkTrunc {
                eta0: None,
                c: 0.1,
                d: 100,
                f: 0.0,
                min_sd: 1.0e-6,
            },
        }
    }

    #[test]
    fn trial_seeds_are_stable_and_distinct() {
        assert_eq!(trial_seed(7, 3), trial_seed(7, 3));
        assert_ne!(trial_seed(7, 3), trial_seed(7, 4));
        assert_ne!(trial_seed(7, 3), trial_seed(8, 3));
    }

    #[test]
    fn permuted_population_is_a_permutation() {
        let values: Vec<f64> = (0..100).map(f64::from).collect();
        let mut source = PermutedPopulation::new(values.clone(), 99, true);
        let mut drawn: Vec<f64> = (0..100).map(|_| source.sample().unwrap()).collect();
        assert_ne!(drawn, values);
        drawn.sort_by(f64::total_cmp);
        assert_eq!(drawn, values);
        assert!(matches!(source.sample(), Err(AuditError::SourceExhausted(100))));
        source.reset();
        assert!(source.sample().is_ok());
    }

    #[test]
    fn with_replacement_never_exhausts() {
        let mut source = PermutedPopulation::new(vec![0.0, 1.0], 1, false);
        for _ in 0..50 {
            let x = source.sample().unwrap();
            assert!(x == 0.0 || x == 1.0);
        }
    }

    #[test]
    fn polling_population_shares() {
        let population = Population::build(&polling_config()).unwrap();
        let ones = population.values.iter().filter(|v| **v == 1.0).count();
        let zeros = population.values.iter().filter(|v| **v == 0.0).count();
        let halves = population.values.iter().filter(|v| **v == 0.5).count();
        assert_eq!((ones, zeros, halves), (1_200, 400, 400));
        assert!((population.reported_mean - 0.7).abs() < 1e-12);
        assert_eq!(population.upper_bound, 1.0);
        assert!(population.noerror.is_none());
    }

    #[test]
    fn comparison_population_counts_discrepancies() {
        let mut config = polling_config();
        config.population = PopulationConfig::Comparison {
            reported_margin: 0.1,
            rates: ErrorRates::new(0.01, 0.02, 0.0, 0.0).unwrap(),
        };
        let population = Population::build(&config).unwrap();
        let noerror = population.noerror.unwrap();
        assert!((noerror - 1.0 / 1.9).abs() < 1e-12);
        assert!((population.upper_bound - 2.0 * noerror).abs() < 1e-12);
        assert_eq!(population.values.len(), 2_000);
        assert_eq!(population.values.iter().filter(|v| **v == 0.0).count(), 20);
        assert_eq!(
            population
                .values
                .iter()
                .filter(|v| **v == 0.5 * noerror)
                .count(),
            40
        );
    }

    #[test]
    fn general_adaptive_tracks_one_vote_overstatements() {
        let mut config = polling_config();
        config.population = PopulationConfig::Comparison {
            reported_margin: 0.1,
            rates: ErrorRates::new(0.0, 0.05, 0.0, 0.0).unwrap(),
        };
        config.strategy = StrategyConfig::GeneralAdaptive {
            d: 100,
            max_risk: 0.9,
        };
        let population = Population::build(&config).unwrap();
        let noerror = population.noerror.unwrap();
        assert_eq!(population.assorter_upper, 1.0);

        let Driver::Betting(mart) = config.build_driver(&population).unwrap() else {
            panic!("betting driver expected");
        };
        let BettingStrategy::GeneralAdaptive(general) = mart.betting() else {
            panic!("general adaptive strategy expected");
        };
        let (tally_noerror, tally_upper) = general.error_tally().unwrap();
        assert_eq!(tally_noerror, noerror);
        assert_eq!(tally_upper, 1.0);

        let mut tracker = SampleTracker::with_error_tally(tally_noerror, tally_upper);
        for _ in 0..47 {
            tracker.add(noerror);
        }
        for _ in 0..3 {
            tracker.add(0.5 * noerror);
        }
        let rates = general.estimated_rates(&tracker);
        let one_vote = rates
            .iter()
            .find(|(value, _)| (value - 0.5 * noerror).abs() < 1e-12)
            .map(|(_, rate)| *rate)
            .unwrap();
        assert!((one_vote - 3.0 / 50.0).abs() < 1e-12, "rate={one_vote}");
    }

    #[test]
    fn comparison_strategy_needs_comparison_population() {
        let mut config = polling_config();
        config.strategy = StrategyConfig::Oracle;
        assert!(matches!(
            config.validate(),
            Err(HarnessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut config = polling_config();
        config.trials = 0;
        assert!(config.validate().is_err());

        let mut config = polling_config();
        config.max_samples = Some(2_001);
        assert!(config.validate().is_err());

        let mut config = polling_config();
        config.population = PopulationConfig::Polling {
            winner_share: 0.7,
            loser_share: 0.4,
        };
        assert!(config.validate().is_err());

        let mut config = polling_config();
        config.risk_limit = 1.5;
        assert!(matches!(config.validate(), Err(HarnessError::Audit(_))));
    }

    #[test]
    fn clear_polling_margin_confirms_every_trial() {
        let result = run_repeated(&polling_config()).unwrap();
        assert_eq!(result.trials, 8);
        assert_eq!(result.count_of(TestH0Status::StatRejectNull.as_str()), 8);
        assert_eq!(result.fail_fraction, 0.0);
        assert!(result.records.windows(2).all(|w| w[0].trial < w[1].trial));
        assert!(result.median_sample_count <= result.p90_sample_count);
        assert!(result.p90_sample_count <= result.max_sample_count);
    }

    #[test]
    fn budget_limits_sample_count() {
        let mut config = polling_config();
        config.max_samples = Some(5);
        let result = run_repeated(&config).unwrap();
        assert_eq!(result.max_sample_count, 5);
        assert_eq!(result.count_of("limit_reached"), 8);
        assert_eq!(result.fail_fraction, 1.0);
    }

    #[test]
    fn config_parses_from_json() {
        let text = r#"{
            "trials": 4,
            "population_size": 500,
            "population": {"kind": "comparison", "reported_margin": 0.2},
            "strategy": {"kind": "adaptive_comparison", "d": 50}
        }"#;
        let config = SimulationConfig::from_json(text).unwrap();
        assert_eq!(config.risk_limit, 0.05);
        assert!(config.without_replacement);
        assert_eq!(config.strategy.name(), "adaptive_comparison");
        assert_eq!(config.strategy.test_kind(), TestKind::Betting);
    }

    #[test]
    fn trial_logs_validate() {
        let mut config = polling_config();
        config.trials = 3;
        let result = run_repeated(&config).unwrap();
        let mut emitter = LogEmitter::to_buffer("sim", "test-run");
        emit_trial_logs(&config, &result, &mut emitter).unwrap();
        let text = String::from_utf8(emitter.buffer().unwrap().to_vec()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        for (i, line) in lines.iter().enumerate() {
            let entry = crate::structured_log::validate_log_line(line, i + 1).unwrap();
            assert_eq!(entry.scope.as_deref(), Some("sim"));
        }
    }
}
