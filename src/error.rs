//! Status taxonomy shared by graph and store errors
//!
//! Every error type in the crate maps onto one of these kinds so callers can
//! decide between retrying (after a reload) and surfacing the failure.

use std::fmt;

/// Coarse classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing key, path or index entry
    NotFound,
    /// Duplicate node key or edge primary key
    AlreadyExists,
    /// Colliding unique-index value or stale ETag on write
    Conflict,
    /// Lease held elsewhere
    Locked,
    /// Malformed tag/index directive or invalid argument
    BadRequest,
    /// Write attempted against a read-only store
    Forbidden,
    /// Serialization or backend failure
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Locked => "Locked",
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::Internal => "Internal",
        }
    }

    /// Whether the same request may succeed after reloading or waiting
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Conflict | ErrorKind::Locked)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Conflict.is_retryable());
        assert!(ErrorKind::Locked.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(!ErrorKind::BadRequest.is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorKind::AlreadyExists.to_string(), "AlreadyExists");
        assert_eq!(format!("{}", ErrorKind::Forbidden), "Forbidden");
    }
}
