//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Whatever went wrong underneath (a rejection, a broken channel, a timeout),
//! callers get one error per failed operation carrying a message fit for the
//! user. The remote frame stays attached as the child of the error tree.

use derive_more::{Display, Error};
use quire_remote::error::Error as RemoteError;

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The operation family that failed.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    #[display("fetch")]
    Fetch,
    #[display("create")]
    Create,
    #[display("update")]
    Update,
    #[display("delete")]
    Delete,
    #[display("reorder")]
    Reorder,
    #[display("link")]
    Link,
    #[display("unlink")]
    Unlink,
    #[display("move")]
    Move,
    #[display("archive")]
    Archive,
}

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The service answered and refused.
    #[display("{operation} rejected: {message}")]
    Rejected { operation: Operation, message: String },
    /// The service could not be reached, or did not answer in time.
    #[display("{operation} failed: {message}")]
    Unavailable { operation: Operation, message: String },
    /// A reorder did not name every member of the collection exactly once.
    #[display("invalid order: {_0}")]
    InvalidOrder(#[error(not(source))] String),
    /// The library was opened with settings that failed validation.
    #[display("invalid configuration: {_0}")]
    InvalidConfig(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// The human-readable message, without the operation prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Rejected { message, .. } | Self::Unavailable { message, .. } => message,
            Self::InvalidOrder(message) | Self::InvalidConfig(message) => message,
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Rejected { operation, .. } | Self::Unavailable { operation, .. } => Some(*operation),
            Self::InvalidOrder(_) => Some(Operation::Reorder),
            Self::InvalidConfig(_) => None,
        }
    }
}

/// Raise a remote failure as a store failure of `operation`.
pub(crate) fn from_remote(operation: Operation, err: RemoteError) -> Error {
    let message = (*err).to_string();
    let kind = if err.is_rejection() {
        ErrorKind::Rejected { operation, message }
    } else {
        ErrorKind::Unavailable { operation, message }
    };
    err.raise(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_model::{EntityKind, EntityRef};
    use quire_remote::error::ErrorKind as RemoteErrorKind;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case(RemoteErrorKind::Rejected("name is required".to_string()), false, "name is required")]
    #[case(RemoteErrorKind::NotFound(EntityRef::new(EntityKind::Scene, 3i64)), false, "scene#3 not found")]
    #[case(RemoteErrorKind::Transport("pipe closed".to_string()), true, "transport failure: pipe closed")]
    #[case(RemoteErrorKind::Timeout(Duration::from_millis(20)), true, "no reply within 20ms")]
    fn test_from_remote(#[case] remote: RemoteErrorKind, #[case] retryable: bool, #[case] message: &str) {
        let err = from_remote(Operation::Update, exn::Exn::from(remote));
        assert_eq!(err.is_retryable(), retryable);
        assert_eq!(err.message(), message);
        assert_eq!(err.operation(), Some(Operation::Update));
    }

    #[test]
    fn test_display() {
        let kind = ErrorKind::Rejected { operation: Operation::Delete, message: "locked".to_string() };
        assert_eq!(kind.to_string(), "delete rejected: locked");
        assert_eq!(ErrorKind::InvalidOrder("missing 4".to_string()).message(), "missing 4");
    }
}
