//! Errors raised by the graph model and index maintainer

use crate::error::ErrorKind;
use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(String),

    #[error("Edge {0} not found")]
    EdgeNotFound(String),

    #[error("No node registered for index {index}={value}")]
    IndexNotFound { index: String, value: String },

    #[error("Node {0} already exists")]
    NodeAlreadyExists(String),

    #[error("Edge {0} already exists")]
    EdgeAlreadyExists(String),

    #[error("Unique index conflict: {index}={value} is already held by node {owner}")]
    IndexConflict {
        index: String,
        value: String,
        owner: String,
    },

    #[error("Invalid edge: source node {0} does not exist")]
    InvalidEdgeSource(String),

    #[error("Invalid edge: target node {0} does not exist")]
    InvalidEdgeTarget(String),

    #[error("Invalid directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("Removal directives are only valid when updating: {0}")]
    UnexpectedRemoval(String),

    #[error("Key must not be empty")]
    EmptyKey,
}

impl GraphError {
    pub(crate) fn invalid_directive(directive: &str, reason: &str) -> Self {
        GraphError::InvalidDirective {
            directive: directive.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::NodeNotFound(_)
            | GraphError::EdgeNotFound(_)
            | GraphError::IndexNotFound { .. }
            | GraphError::InvalidEdgeSource(_)
            | GraphError::InvalidEdgeTarget(_) => ErrorKind::NotFound,
            GraphError::NodeAlreadyExists(_) | GraphError::EdgeAlreadyExists(_) => {
                ErrorKind::AlreadyExists
            }
            GraphError::IndexConflict { .. } => ErrorKind::Conflict,
            GraphError::InvalidDirective { .. }
            | GraphError::UnexpectedRemoval(_)
            | GraphError::EmptyKey => ErrorKind::BadRequest,
        }
    }
}

pub type GraphResult<T> = Result<T, GraphError>;
