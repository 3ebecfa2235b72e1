//! Errors raised by the value types in this crate.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Input that cannot become a well-formed domain value.
///
/// Order-level business denials live in `shopdesk-orders`; this type only
/// covers malformed values and stale versions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Submitted field was rejected (unknown status, empty order number, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The stored version is not the one a write was planned against.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
