//! Test configuration and trace mode.
//!
//! Per-test parameters live in [`TestConfig`], validated once at
//! construction. Tracing is process-wide and set via the `RLAUDIT_TRACE`
//! environment variable:
//! - `off` (default): drivers keep only what [`crate::TestResult`] carries.
//! - `sequences`: drivers also keep the per-draw `x`, `µ`, `η`/`λ`, `t` and
//!   `T` sequences, retrievable after a run.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};

/// Name of the environment variable read by [`trace_mode`].
pub const TRACE_ENV: &str = "RLAUDIT_TRACE";

/// Parameters shared by both test drivers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    /// α, strictly inside (0, 1).
    pub risk_limit: f64,
    /// N, the number of cards in the population.
    pub population_size: usize,
    pub without_replacement: bool,
    /// Upper bound `u` of the assort values.
    pub upper_bound: f64,
}

impl TestConfig {
    pub fn new(
        risk_limit: f64,
        population_size: usize,
        without_replacement: bool,
        upper_bound: f64,
    ) -> Result<Self> {
        let config = Self {
            risk_limit,
            population_size,
            without_replacement,
            upper_bound,
        };
        config.validate()?;
        Ok(config)
    }

    /// Re-check a config that came from deserialization.
    pub fn validate(&self) -> Result<()> {
        if !(self.risk_limit > 0.0 && self.risk_limit < 1.0) {
            return Err(AuditError::InvalidRiskLimit(self.risk_limit));
        }
        if self.population_size == 0 {
            return Err(AuditError::EmptyPopulation);
        }
        if !(self.upper_bound > 0.0) {
            return Err(AuditError::InvalidUpperBound(self.upper_bound));
        }
        Ok(())
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            risk_limit: 0.05,
            population_size: 1,
            without_replacement: true,
            upper_bound: 1.0,
        }
    }
}

/// Whether drivers keep per-draw sequences.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceMode {
    #[default]
    Off,
    Sequences,
}

impl TraceMode {
    /// Parse from string (case-insensitive). Unknown values mean `Off`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequences" | "seq" | "trace" | "on" | "1" | "true" => Self::Sequences,
            _ => Self::Off,
        }
    }

    #[must_use]
    pub const fn collects(self) -> bool {
        matches!(self, Self::Sequences)
    }
}

// 0=unresolved, 1=Off, 2=Sequences.
static CACHED_TRACE: AtomicU8 = AtomicU8::new(0);

const TRACE_UNRESOLVED: u8 = 0;
const TRACE_OFF: u8 = 1;
const TRACE_SEQUENCES: u8 = 2;

fn mode_to_u8(mode: TraceMode) -> u8 {
    match mode {
        TraceMode::Off => TRACE_OFF,
        TraceMode::Sequences => TRACE_SEQUENCES,
    }
}

fn u8_to_mode(v: u8) -> TraceMode {
    match v {
        TRACE_SEQUENCES => TraceMode::Sequences,
        _ => TraceMode::Off,
    }
}

/// Trace mode from `RLAUDIT_TRACE`, read on first call and cached.
#[must_use]
pub fn trace_mode() -> TraceMode {
    let cached = CACHED_TRACE.load(Ordering::Relaxed);
    if cached != TRACE_UNRESOLVED {
        return u8_to_mode(cached);
    }
    let mode = std::env::var(TRACE_ENV)
        .map(|v| TraceMode::from_str_loose(&v))
        .unwrap_or_default();
    CACHED_TRACE.store(mode_to_u8(mode), Ordering::Release);
    mode
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation() {
        assert!(TestConfig::new(0.05, 100, true, 1.0).is_ok());
        assert_eq!(
            TestConfig::new(0.0, 100, true, 1.0),
            Err(AuditError::InvalidRiskLimit(0.0))
        );
        assert_eq!(
            TestConfig::new(1.0, 100, true, 1.0),
            Err(AuditError::InvalidRiskLimit(1.0))
        );
        assert_eq!(
            TestConfig::new(0.05, 0, true, 1.0),
            Err(AuditError::EmptyPopulation)
        );
        assert_eq!(
            TestConfig::new(0.05, 10, false, 0.0),
            Err(AuditError::InvalidUpperBound(0.0))
        );
        assert!(TestConfig::new(f64::NAN, 10, false, 1.0).is_err());
    }

    #[test]
    fn default_config_is_valid() {
        let config = TestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.risk_limit, 0.05);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = TestConfig::new(0.1, 5000, false, 1.2).expect("valid");
        let json = serde_json::to_string(&config).expect("serialize");
        let back: TestConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }

    #[test]
    fn parse_trace_modes() {
        assert_eq!(TraceMode::from_str_loose("sequences"), TraceMode::Sequences);
        assert_eq!(TraceMode::from_str_loose("SEQ"), TraceMode::Sequences);
        assert_eq!(TraceMode::from_str_loose(" on "), TraceMode::Sequences);
        assert_eq!(TraceMode::from_str_loose("off"), TraceMode::Off);
        assert_eq!(TraceMode::from_str_loose("bogus"), TraceMode::Off);
        assert_eq!(TraceMode::default(), TraceMode::Off);
        assert!(TraceMode::Sequences.collects());
    }

    #[test]
    fn cached_mode_is_sticky() {
        let previous = CACHED_TRACE.swap(TRACE_SEQUENCES, Ordering::SeqCst);
        assert_eq!(trace_mode(), TraceMode::Sequences);
        CACHED_TRACE.store(TRACE_OFF, Ordering::SeqCst);
        assert_eq!(trace_mode(), TraceMode::Off);
        CACHED_TRACE.store(previous, Ordering::SeqCst);
    }
}
