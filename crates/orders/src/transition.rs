//! Status transition rules.
//!
//! Terminal statuses (`Cancelled`, `Returned`) deny every request. Every other
//! status may move to any status, backwards and sideways included, so staff
//! can correct a mis-click (`Shipped -> Processing`). Do not tighten this into
//! a forward-only lattice without a product decision.

use crate::status::OrderStatus;

/// Outcome of validating a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Allow(TransitionEffect),
    Deny(DenyReason),
}

/// Side effect that must be written together with an allowed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEffect {
    None,
    /// First entry into `Cancelled`: the cancellation record is written in the
    /// same conditional update as the status.
    RecordCancellation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    TerminalState,
}

/// Decide whether `current -> requested` is legal. Pure.
pub fn validate(current: OrderStatus, requested: OrderStatus) -> Transition {
    if current.is_terminal() {
        return Transition::Deny(DenyReason::TerminalState);
    }

    if requested == OrderStatus::Cancelled {
        Transition::Allow(TransitionEffect::RecordCancellation)
    } else {
        Transition::Allow(TransitionEffect::None)
    }
}
