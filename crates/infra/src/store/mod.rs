//! Order persistence boundary.
//!
//! The lifecycle services only ever talk to [`OrderStore`]; two adapters ship
//! with the crate:
//!
//! - [`InMemoryOrderStore`] for tests and local development
//! - [`PostgresOrderStore`] for production (`DATABASE_URL`)
//!
//! ## Conditional writes
//!
//! Every mutation goes through [`OrderStore::update`] with a
//! [`WritePrecondition`]. The store applies the typed patch only when the
//! stored version still matches and, for status and payment writes, the stored
//! order is not cancelled. Both checks happen atomically with the write, so
//! two racing writers can never both succeed against the same version.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use shopdesk_core::{ExpectedVersion, OrderId};
use shopdesk_orders::{Order, OrderError, OrderPatch};

use crate::query::{OrderQuery, OrderSort};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;

/// Precondition evaluated by the store at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePrecondition {
    pub expected_version: ExpectedVersion,
    pub require_not_cancelled: bool,
}

impl WritePrecondition {
    /// Precondition for writing `patch` over an order read at `version`.
    pub fn for_patch(version: u64, patch: &OrderPatch) -> Self {
        Self {
            expected_version: ExpectedVersion::Exact(version),
            require_not_cancelled: patch.requires_not_cancelled(),
        }
    }
}

/// Store operation error.
///
/// These are **infrastructure errors**; business denials detected at write
/// time are carried through unchanged in [`StoreError::Rejected`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// The stored version moved since the order was read.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// The stored order rejected the patch (e.g. it was cancelled meanwhile).
    #[error(transparent)]
    Rejected(OrderError),

    #[error("duplicate order: {0}")]
    Duplicate(String),

    /// A stored row could not be turned back into an order.
    #[error("corrupt order record: {0}")]
    Corrupt(String),

    /// Backend failed or did not answer in time. The only retryable class.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Durable record of every order and its current state.
#[async_trait::async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a freshly placed order. Fails with `Duplicate` when the id or
    /// order number is taken.
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;

    async fn find(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Orders matching `query`, ordered by `sort` with ties broken on id.
    async fn find_many(&self, query: &OrderQuery, sort: OrderSort) -> Result<Vec<Order>, StoreError>;

    /// Conditionally apply `patch` and return the order as written.
    async fn update(
        &self,
        id: OrderId,
        precondition: WritePrecondition,
        patch: &OrderPatch,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError>;

    /// Hard delete. Bypasses the state machine.
    async fn delete(&self, id: OrderId) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        (**self).insert(order).await
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).find(id).await
    }

    async fn find_many(&self, query: &OrderQuery, sort: OrderSort) -> Result<Vec<Order>, StoreError> {
        (**self).find_many(query, sort).await
    }

    async fn update(
        &self,
        id: OrderId,
        precondition: WritePrecondition,
        patch: &OrderPatch,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        (**self).update(id, precondition, patch, now).await
    }

    async fn delete(&self, id: OrderId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }
}

/// Business error the store reports when a guarded write hits a cancelled order.
pub(crate) fn cancelled_rejection(patch: &OrderPatch) -> OrderError {
    match patch {
        OrderPatch::Payment(_) => OrderError::OrderCancelledImmutable,
        _ => OrderError::OrderCancelledCannotModify,
    }
}
