//! Error types for validation.

use thiserror::Error;

/// Errors that stop validation from producing a report.
#[derive(Debug, Error)]
pub enum Error {
    /// Trigger list does not have a shape the thresholds can be checked on.
    #[error("invalid trigger set: {0}")]
    InvalidTriggerSet(String),
}

/// Result type alias for validation operations.
pub type Result<T> = std::result::Result<T, Error>;
