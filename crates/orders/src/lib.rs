//! Order lifecycle domain module.
//!
//! Business rules for storefront orders: status transitions, payment
//! reconciliation and the one-time cancellation record. Implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod cancellation;
pub mod error;
pub mod order;
pub mod patch;
pub mod status;
pub mod transition;

pub use cancellation::{CancellationActor, CancellationRecord};
pub use error::OrderError;
pub use order::{CustomerSnapshot, LineItem, NewOrder, Order, OrderParts, ShippingAddress, StatusChange};
pub use patch::{AdminNotesPatch, OrderPatch, PaymentPatch, StatusPatch};
pub use status::OrderStatus;
pub use transition::{DenyReason, Transition, TransitionEffect, validate};
