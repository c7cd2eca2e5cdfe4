//! Error types for lock operations.

use thiserror::Error;

/// Errors that can occur during lock operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Lock path failed validation.
    #[error("invalid lock path: {0:?}")]
    InvalidPath(String),
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
