//! Error types for rule model parsing.

use thiserror::Error;

/// Errors that can occur while reading or building rules.
#[derive(Debug, Error)]
pub enum Error {
    /// Handler tag is not in the registry.
    #[error("unknown action type: {0}")]
    UnknownActionType(String),

    /// Owner reference is not `team:<id>` or `user:<id>`.
    #[error("invalid owner '{0}': expected team:<id> or user:<id>")]
    InvalidOwner(String),

    /// Threshold type outside the known wire values.
    #[error("invalid threshold type: {0}")]
    InvalidThresholdType(u8),

    /// Threshold value is neither empty nor numeric.
    #[error("invalid threshold '{0}'")]
    InvalidThreshold(String),

    /// JSON parsing error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias for rule model operations.
pub type Result<T> = std::result::Result<T, Error>;
