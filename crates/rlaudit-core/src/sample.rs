//! Sources of assort values for the test drivers.
//!
//! Drivers accept any `FnMut() -> f64`; a [`SampleSource`] adds a reset and a
//! known population size so the same source can feed repeated runs.

use crate::error::{AuditError, Result};

pub trait SampleSource {
    /// Next assort value.
    fn sample(&mut self) -> Result<f64>;

    /// Rewind for a fresh run.
    fn reset(&mut self);

    fn population_size(&self) -> usize;
}

/// Replays a fixed list in order.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFromList {
    values: Vec<f64>,
    next: usize,
}

impl SampleFromList {
    #[must_use]
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, next: 0 }
    }

    /// Values handed out so far.
    #[must_use]
    pub fn drawn(&self) -> usize {
        self.next
    }
}

impl SampleSource for SampleFromList {
    fn sample(&mut self) -> Result<f64> {
        let value = self
            .values
            .get(self.next)
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
