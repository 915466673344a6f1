//! Remote Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! The service can fail in two ways that matter to callers: it can answer
//! with `success: false` ([`ErrorKind::Rejected`], [`ErrorKind::NotFound`]),
//! or it can fail to answer at all ([`ErrorKind::Transport`],
//! [`ErrorKind::Timeout`], [`ErrorKind::MalformedReply`]). Both travel
//! through the same error channel.

use derive_more::{Display, Error};
use quire_model::EntityRef;
use std::time::Duration;

/// A remote error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for remote operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The service answered and refused the request. The message is meant for
    /// the user.
    #[display("{_0}")]
    Rejected(#[error(not(source))] String),
    /// The referenced entity does not exist (any more).
    #[display("{_0} not found")]
    NotFound(#[error(not(source))] EntityRef),
    /// The call itself failed: the channel to the service is broken.
    #[display("transport failure: {_0}")]
    Transport(#[error(not(source))] String),
    /// No answer arrived in time.
    #[display("no reply within {}ms", _0.as_millis())]
    Timeout(#[error(not(source))] Duration),
    /// An answer arrived but could not be understood.
    #[display("malformed reply")]
    MalformedReply,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }

    /// Returns `true` if the service answered (as opposed to being unreachable).
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::NotFound(_))
    }
}
