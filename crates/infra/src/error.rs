//! Engine boundary error, carrying the stable machine-readable code.

use thiserror::Error;

use shopdesk_core::OrderId;
use shopdesk_orders::OrderError;

use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Business denial from the order aggregate. Never retried.
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Conditional-write retries exhausted under contention.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal consistency failure: {0}")]
    InternalConsistency(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Order(e) => e.code(),
            EngineError::NotFound(_) => "OrderNotFound",
            EngineError::Validation(_) => "ValidationError",
            EngineError::StoreUnavailable(_) => "StoreUnavailable",
            EngineError::Conflict(_) => "Conflict",
            EngineError::InternalConsistency(_) => "InternalConsistency",
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            StoreError::Conflict(msg) => EngineError::Conflict(msg),
            StoreError::Rejected(e) => EngineError::Order(e),
            StoreError::Duplicate(msg) => EngineError::Conflict(msg),
            StoreError::Corrupt(msg) => EngineError::InternalConsistency(msg),
            StoreError::Unavailable(msg) => EngineError::StoreUnavailable(msg),
        }
    }
}
