use shopdesk_core::DomainError;
use thiserror::Error;

use crate::status::OrderStatus;

/// Business-rule failures raised by the order aggregate.
///
/// None of these are retryable: the same request against the same order will
/// be denied again.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order is {from}, a terminal status; cannot move to {to}")]
    TerminalState { from: OrderStatus, to: OrderStatus },

    #[error("order is cancelled and cannot be modified")]
    OrderCancelledCannotModify,

    #[error("order is cancelled; payment state is frozen")]
    OrderCancelledImmutable,

    /// A second cancellation record for the same order. Unreachable while
    /// `Cancelled` stays terminal; reaching it means stored state is corrupt.
    #[error("cancellation already recorded at {recorded_at}")]
    CancellationAlreadyRecorded { recorded_at: chrono::DateTime<chrono::Utc> },

    #[error("order is {0}; customers may only cancel pending or processing orders")]
    NotCancellableByCustomer(OrderStatus),

    #[error("order does not belong to the requesting customer")]
    NotOrderOwner,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl OrderError {
    /// Stable machine-readable code surfaced to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::TerminalState { .. } => "TerminalState",
            OrderError::OrderCancelledCannotModify => "OrderCancelledCannotModify",
            OrderError::OrderCancelledImmutable => "OrderCancelledImmutable",
            OrderError::CancellationAlreadyRecorded { .. } => "InternalConsistency",
            OrderError::NotCancellableByCustomer(_) => "NotCancellableByCustomer",
            OrderError::NotOrderOwner => "Forbidden",
            OrderError::Domain(DomainError::Validation(_) | DomainError::InvalidId(_)) => {
                "ValidationError"
            }
            OrderError::Domain(DomainError::Conflict(_)) => "Conflict",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        OrderError::Domain(DomainError::validation(msg))
    }
}
