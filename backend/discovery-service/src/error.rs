//! Error taxonomy for the discovery engine.
//!
//! Request-level problems (bad token, bad paging, unknown video) are
//! [`Rejection`]s and end up in the `Listing::Invalid` sentinel. Collaborator
//! failures are [`StorageError`]s and always reach the caller untouched.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("auth token is unresolved or ambiguous")]
    AuthInvalid,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("video not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage query timed out after {0:?}")]
    Timeout(Duration),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DiscoveryError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::Rejected(Rejection::InvalidArgument(message.into()))
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
pub type Result<T> = std::result::Result<T, DiscoveryError>;
