//! Error types for the risk-measuring engine.
//!
//! Two families of failure exist and they never mix:
//!
//! - **Contract violations** ([`AuditError`]): a misconfigured test or a
//!   defective sample generator. These fail fast, at construction or at the
//!   offending draw.
//! - **Statistical boundary conditions** (µ_j leaving `[0, u]`): these are not
//!   errors. They surface as terminal [`crate::TestH0Status`] values.
//!
//! Optimizer non-convergence lives in [`crate::optimize::SolverError`] and is
//! absorbed by the betting strategies, never propagated out of a test run.

use thiserror::Error;

/// Errors raised by constructors and test drivers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuditError {
    /// Risk limit α must lie strictly inside (0, 1).
    #[error("risk limit {0} outside (0, 1)")]
    InvalidRiskLimit(f64),

    /// Upper bound of the assort values must be positive.
    #[error("upper bound {0} must be > 0")]
    InvalidUpperBound(f64),

    /// Population size must be positive.
    #[error("population size must be > 0")]
    EmptyPopulation,

    /// A strategy parameter failed its construction-time check.
    #[error("invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Supermajority minimum fraction must lie strictly inside (0, 1).
    #[error("minimum fraction {0} outside (0, 1)")]
    InvalidMinFraction(f64),

    /// Comparison audits require the reported assorter mean to exceed 1/2.
    #[error("reported assorter mean {0} must be > 0.5")]
    InvalidReportedMean(f64),

    /// Comparison audits require the no-error bassort value to exceed 1/2.
    #[error("noerror value {0} must be > 0.5")]
    InvalidNoerror(f64),

    /// A discrepancy rate fell outside [0, 1].
    #[error("error rate {name}={value} outside [0, 1]")]
    InvalidRate { name: &'static str, value: f64 },

    /// Discrepancy rates handed to the Kelly solver sum past 1.
    #[error("discrepancy rates sum to {0}, leaving a negative no-error rate")]
    InvalidKellyRates(f64),

    /// The sample generator produced a value outside `[0, upper]`.
    #[error("draw {index} = {value} outside [0, {upper}]")]
    SampleOutOfBounds { index: usize, value: f64, upper: f64 },

    /// The caller asked for more draws than the population holds.
    #[error("max samples {max_samples} exceeds population size {population}")]
    MaxSamplesExceedsPopulation { max_samples: usize, population: usize },

    /// Under card-style information the CVR must carry the contest.
    #[error("cvr {cvr_id} does not contain contest {contest}")]
    MissingContest { cvr_id: String, contest: u32 },

    /// A finite sample source ran out of values.
    #[error("sample source exhausted after {0} draws")]
    SourceExhausted(usize),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Reject `value` unless `ok` holds.
pub(crate) fn require(
    ok: bool,
    name: &'static str,
    value: f64,
    reason: &'static str,
) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(AuditError::InvalidParameter {
            name,
            value,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_carry_values() {
        let err = AuditError::SampleOutOfBounds {
            index: 3,
            value: 1.5,
            upper: 1.0,
        };
        assert_eq!(err.to_string(), "draw 3 = 1.5 outside [0, 1]");
        assert_eq!(
            AuditError::InvalidRiskLimit(1.2).to_string(),
            "risk limit 1.2 outside (0, 1)"
        );
    }

    #[test]
    fn require_passes_and_fails() {
        assert!(require(true, "c", 0.1, "must be > 0").is_ok());
        let err = require(false, "c", -0.1, "must be > 0").unwrap_err();
        assert_eq!(err.to_string(), "invalid parameter c=-0.1: must be > 0");
    }
}
