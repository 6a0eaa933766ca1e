//! Sequential risk-measuring engine for risk-limiting election audits.
//!
//! Tests `H0: mean of the assort values <= 1/2` one draw at a time and
//! reports an anytime-valid p-value after every draw.
//!
//! # Architecture
//!
//! - **Drivers** (`alpha_mart`, `betting_mart`): the two test
//!   supermartingales and their terminal states
//! - **Strategies** (`estim`, `betting`): predictable η_j or λ_j from the
//!   draws seen so far
//! - **Kelly solver** (`kelly`, `optimize`): growth-optimal λ for given
//!   discrepancy rates, behind a bounded scalar maximizer
//! - **State** (`welford`, `tracker`, `population`): running statistics and
//!   the null mean of the unseen population
//! - **Assort model** (`assorter`, `error_rates`): ballot records to bounded
//!   scores, discrepancy classes and their rates
//! - **Configuration** (`config`): validated test parameters and trace mode

#![deny(unsafe_code)]

pub mod alpha_mart;
pub mod assorter;
pub mod betting;
pub mod betting_mart;
pub mod config;
pub mod error;
pub mod error_rates;
pub mod estim;
pub mod kelly;
pub mod numeric;
pub mod optimize;
pub mod population;
pub mod result;
pub mod sample;
pub mod tracker;
pub mod welford;

pub use alpha_mart::AlphaMart;
pub use assorter::{AboveThresholdAssorter, Assorter, ClcaAssorter, Cvr, PluralityAssorter};
pub use betting::{BettingFn, BettingStrategy, FixedBet};
pub use betting_mart::BettingMart;
pub use config::{TestConfig, TraceMode, trace_mode};
pub use error::{AuditError, Result};
pub use error_rates::{ClcaErrorCounts, ClcaErrorTable, ErrorRates, Taus};
pub use estim::{EstimFn, Estimator};
pub use kelly::{GeneralOptimalLambda, OptimalLambda};
pub use optimize::{BrentMaximizer, ScalarMaximizer, SolverError};
pub use population::population_mean_under_null;
pub use result::{TestH0Status, TestResult, TestSummary, TraceCollector};
pub use sample::{SampleFromList, SampleSource};
pub use tracker::SampleTracker;
