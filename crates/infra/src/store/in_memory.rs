use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use shopdesk_core::{AggregateRoot, OrderId};
use shopdesk_orders::{Order, OrderPatch};

use super::{OrderStore, StoreError, WritePrecondition, cancelled_rejection};
use crate::query::{OrderQuery, OrderSort};

/// In-memory order store for tests/dev.
///
/// A single `RwLock` makes each conditional update atomic: the version check,
/// the cancellation check and the write happen under one write guard.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    inner: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("in-memory order store lock poisoned".to_string())
}

#[async_trait::async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;

        if map.contains_key(order.id()) {
            return Err(StoreError::Duplicate(format!("order id {} already exists", order.id())));
        }
        if map.values().any(|o| o.order_number() == order.order_number()) {
            return Err(StoreError::Duplicate(format!(
                "order number {} already exists",
                order.order_number()
            )));
        }

        map.insert(*order.id(), order.clone());
        Ok(())
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&id).cloned())
    }

    async fn find_many(&self, query: &OrderQuery, sort: OrderSort) -> Result<Vec<Order>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;

        let mut orders: Vec<Order> = map.values().filter(|o| query.matches(o)).cloned().collect();
        orders.sort_by(|a, b| sort.compare(a, b));
        Ok(orders)
    }

    async fn update(
        &self,
        id: OrderId,
        precondition: WritePrecondition,
        patch: &OrderPatch,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let stored = map.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        precondition
            .expected_version
            .check(stored.version())
            .map_err(|e| StoreError::Conflict(e.to_string()))?;

        if precondition.require_not_cancelled && stored.is_cancelled() {
            return Err(StoreError::Rejected(cancelled_rejection(patch)));
        }

        let mut next = stored.clone();
        patch.apply_to(&mut next, now).map_err(StoreError::Rejected)?;
        *stored = next.clone();

        Ok(next)
    }

    async fn delete(&self, id: OrderId) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.remove(&id).map(|_| ()).ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{new_order, place};
    use shopdesk_core::ExpectedVersion;
    use shopdesk_orders::{OrderError, OrderStatus, PaymentPatch, StatusChange, CancellationActor};

    #[tokio::test]
    async fn stale_version_is_a_conflict_and_leaves_order_untouched() {
        let store = InMemoryOrderStore::new();
        let order = place(&store, "SD-3001").await;

        let patch = OrderPatch::from(PaymentPatch { is_paid: true });
        store
            .update(*order.id(), WritePrecondition::for_patch(1, &patch), &patch, Utc::now())
            .await
            .unwrap();

        let err = store
            .update(*order.id(), WritePrecondition::for_patch(1, &patch), &patch, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.find(*order.id()).await.unwrap().unwrap().version(), 2);
    }

    #[tokio::test]
    async fn guarded_write_on_cancelled_order_is_rejected() {
        let store = InMemoryOrderStore::new();
        let order = place(&store, "SD-3002").await;

        let cancel = OrderPatch::from(
            order
                .plan_status_change(&StatusChange::to(OrderStatus::Cancelled), CancellationActor::Admin, Utc::now())
                .unwrap(),
        );
        let cancelled = store
            .update(*order.id(), WritePrecondition::for_patch(1, &cancel), &cancel, Utc::now())
            .await
            .unwrap();

        let pay = OrderPatch::from(PaymentPatch { is_paid: true });
        let precondition = WritePrecondition {
            expected_version: ExpectedVersion::Any,
            require_not_cancelled: true,
        };
        let err = store.update(*order.id(), precondition, &pay, Utc::now()).await.unwrap_err();
        assert_eq!(err, StoreError::Rejected(OrderError::OrderCancelledImmutable));
        assert_eq!(store.find(*order.id()).await.unwrap().unwrap(), cancelled);
    }

    #[tokio::test]
    async fn duplicate_order_number_is_rejected() {
        let store = InMemoryOrderStore::new();
        place(&store, "SD-3003").await;

        let again = Order::place(new_order("SD-3003"), Utc::now()).unwrap();
        assert!(matches!(store.insert(&again).await, Err(StoreError::Duplicate(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_regardless_of_status() {
        let store = InMemoryOrderStore::new();
        let order = place(&store, "SD-3004").await;

        store.delete(*order.id()).await.unwrap();
        assert_eq!(store.find(*order.id()).await.unwrap(), None);
        assert_eq!(store.delete(*order.id()).await, Err(StoreError::NotFound(*order.id())));
    }
}
