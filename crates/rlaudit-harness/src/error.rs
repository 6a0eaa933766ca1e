//! Harness error type.

use rlaudit_core::AuditError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// A simulation config that deserialized but makes no sense.
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),

    /// A worker thread panicked.
    #[error("simulation worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, HarnessError>;
