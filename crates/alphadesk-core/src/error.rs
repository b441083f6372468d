//! Error types for alphadesk-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Unknown job status: {0}")]
    UnknownStatus(String),

    #[error("Invalid job id: {0}")]
    InvalidJobId(#[from] uuid::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
