//! Errors raised by blob stores, leases and snapshot persistence

use crate::error::ErrorKind;
use crate::graph::GraphError;
use thiserror::Error;

/// Blob store and snapshot errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// No blob at the path
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// Create-if-absent write found an existing blob
    #[error("Blob already exists: {0}")]
    AlreadyExists(String),

    /// ETag precondition failed
    #[error("Blob {0} has changed since it was read")]
    Conflict(String),

    /// Lease held by someone else
    #[error("Resource is currently locked: {0}")]
    Locked(String),

    /// Lease token does not match the active lease
    #[error("Lease {lease} is not held on {path}")]
    LeaseNotHeld { path: String, lease: String },

    #[error("Invalid blob path: {0:?}")]
    InvalidPath(String),

    /// Write attempted on a read-only store
    #[error("Store is read-only: {0}")]
    ReadOnly(String),

    /// Lease is held but no graph map has been loaded under it
    #[error("Graph map for {0} has not been loaded")]
    NotLoaded(String),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::Locked(_) | StoreError::LeaseNotHeld { .. } => ErrorKind::Locked,
            StoreError::InvalidPath(_) => ErrorKind::BadRequest,
            StoreError::ReadOnly(_) => ErrorKind::Forbidden,
            StoreError::Graph(err) => err.kind(),
            StoreError::NotLoaded(_) | StoreError::Serialization(_) | StoreError::Backend(_) => {
                ErrorKind::Internal
            }
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
