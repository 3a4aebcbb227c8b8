//! Staging error types.

use thiserror::Error;

/// Error raised while buffering a result stream to disk.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upstream stream failed while staging: {0}")]
    Upstream(String),
}

/// Result type for staging operations.
pub type StagingResult<T> = std::result::Result<T, StagingError>;
