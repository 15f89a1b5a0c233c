//! Error types for the filter manager and the persisted filters it owns.

use std::io;

use thiserror::Error;

/// Errors from the persisted filter layer.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid filter parameters: {0}")]
    InvalidParams(String),

    #[error("filter {0:?} does not exist on disk")]
    MissingOnDisk(String),

    #[error("filter {0:?} has been destroyed")]
    Destroyed(String),
}

/// Errors surfaced by the filter manager to its callers.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("no filter named {0:?}")]
    NoSuchFilter(String),

    #[error("filter {0:?} already exists")]
    FilterExists(String),

    #[error("failed to create filter {name:?}: {source}")]
    CreateFailed {
        name: String,
        #[source]
        source: FilterError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ManagerError {
    /// Wrap an underlying filter failure that escaped mid-operation,
    /// after the filter was already resolved.
    pub(crate) fn internal(name: &str, source: FilterError) -> Self {
        ManagerError::Internal(format!("filter {name:?}: {source}"))
    }
}
