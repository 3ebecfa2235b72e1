//! `shopdesk-core`: identifiers, money and versioning primitives shared by every crate.
//!
//! No IO and no async.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{OrderId, ProductId, UserId};
pub use value_object::Money;
