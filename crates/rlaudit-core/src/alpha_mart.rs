//! ALPHA test supermartingale (Stark 2023, eq. 4).
//!
//! ## Mathematical Foundation
//!
//! For draws `X_j ∈ [0, u]`, null mean `µ_j` and predictable estimate η_j:
//!
//! ```text
//! t_j = (X_j·η_j/µ_j + (u - X_j)(u - η_j)/(u - µ_j)) / u
//! T_j = Π t_i,   p_j = 1/T_j
//! ```
//!
//! ## Key Invariants
//!
//! 1. η_j and µ_j are computed before `X_j` is added to the tracker.
//! 2. When µ_j is numerically at 0 or `u`, or `t_j` is numerically 0, the
//!    term is replaced by 1 so `T` never collapses to exactly zero.
//! 3. µ_j outside `[0, u]` ends the run with a boundary status; the draw that
//!    revealed it is counted but not incorporated.

use crate::config::{TestConfig, TraceMode, trace_mode};
use crate::error::{AuditError, Result};
use crate::estim::EstimFn;
use crate::numeric::double_is_close;
use crate::population::population_mean_under_null;
use crate::result::{TestH0Status, TestResult, TraceCollector};
use crate::sample::SampleSource;
use crate::tracker::SampleTracker;

/// Sequential ALPHA test of `H0: mean <= 1/2`.
#[derive(Debug, Clone)]
pub struct AlphaMart<E> {
    estimator: E,
    config: TestConfig,
    trace_mode: TraceMode,
    trace: Option<TraceCollector>,
}

impl<E: EstimFn> AlphaMart<E> {
    pub fn new(estimator: E, config: TestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            estimator,
            config,
            trace_mode: trace_mode(),
            trace: None,
        })
    }

    /// Override the process-wide [`TraceMode`] for this driver.
    #[must_use]
    pub fn with_trace_mode(mut self, mode: TraceMode) -> Self {
        self.trace_mode = mode;
        self
    }

    #[must_use]
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    #[must_use]
    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    /// Per-draw sequences of the last run, when tracing was on.
    #[must_use]
    pub fn trace(&self) -> Option<&TraceCollector> {
        self.trace.as_ref()
    }

    /// Run the test on values from `draw`, at most `max_samples` of them.
    pub fn test_h0<F>(
        &mut self,
        max_samples: usize,
        terminate_on_null_reject: bool,
        mut draw: F,
    ) -> Result<TestResult>
    where
        F: FnMut() -> f64,
    {
        self.run(max_samples, terminate_on_null_reject, || Ok(draw()))
    }

    /// Run the test on values from `source`.
    pub fn test_h0_from<S: SampleSource + ?Sized>(
        &mut self,
        max_samples: usize,
        terminate_on_null_reject: bool,
        source: &mut S,
    ) -> Result<TestResult> {
        self.run(max_samples, terminate_on_null_reject, || source.sample())
    }

    fn run<D>(
        &mut self,
        max_samples: usize,
        terminate_on_null_reject: bool,
        mut draw: D,
    ) -> Result<TestResult>
    where
        D: FnMut() -> Result<f64>,
    {
        let TestConfig {
            risk_limit,
            population_size,
            without_replacement,
            upper_bound: u,
        } = self.config;
        if max_samples > population_size {
            return Err(AuditError::MaxSamplesExceedsPopulation {
                max_samples,
                population: population_size,
            });
        }

        let mut tracker = SampleTracker::new();
        let mut trace = self.trace_mode.collects().then(TraceCollector::new);
        let mut pvalues = Vec::new();
        let mut etas = Vec::new();
        let mut statistic = 1.0;
        let mut sample_count = 0;
        let mut status = TestH0Status::LimitReached;

        while sample_count < max_samples {
            let x = draw()?;
            if !(0.0..=u).contains(&x) {
                return Err(AuditError::SampleOutOfBounds {
                    index: sample_count,
                    value: x,
                    upper: u,
                });
            }
            sample_count += 1;

            let eta = self.estimator.eta(&tracker);
            let mu = population_mean_under_null(population_size, without_replacement, &tracker);
            if mu < 0.0 {
                status = TestH0Status::SampleSumExceeds;
                break;
            }
            if mu > u {
                status = TestH0Status::AcceptNull;
                break;
            }

            let tj = alpha_term(x, eta, mu, u);
            statistic *= tj;
            tracker.add(x);

            let pvalue = 1.0 / statistic;
            pvalues.push(pvalue);
            etas.push(eta);
            if let Some(trace) = trace.as_mut() {
                trace.record(x, mu, eta, tj, statistic);
            }

            if terminate_on_null_reject && pvalue < risk_limit {
                status = TestH0Status::StatRejectNull;
                break;
            }
        }

        self.trace = trace;
        Ok(TestResult {
            status,
            sample_count,
            sample_mean: tracker.mean(),
            pvalues,
            auxiliary: etas,
        })
    }
}

fn alpha_term(x: f64, eta: f64, mu: f64, u: f64) -> f64 {
    if double_is_close(0.0, mu) || double_is_close(u, mu) {
        return 1.0;
    }
    let tj = (x * eta / mu + (u - x) * (u - eta) / (u - mu)) / u;
    if double_is_close(tj, 0.0) { 1.0 } else { tj }
}
