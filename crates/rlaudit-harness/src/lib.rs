//! Simulation harness for the rlaudit engine.
//!
//! This crate provides:
//! - Seeded populations of assort values and repeated-trial simulation
//! - Structured JSONL logging and an artifact index with SHA-256 digests
//! - The `harness` CLI

#![forbid(unsafe_code)]

pub mod error;
pub mod simulation;
pub mod structured_log;

pub use error::{HarnessError, Result};
pub use simulation::{
    PermutedPopulation, PopulationConfig, RunRepeatedResult, SimulationConfig, StrategyConfig,
    TrialRecord, emit_trial_logs, run_repeated, trial_seed,
};
pub use structured_log::{ArtifactIndex, LogEmitter, LogEntry, LogLevel};
