//! Shared fixtures for engine tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

use shopdesk_core::{AggregateRoot, Money, OrderId, ProductId, UserId};
use shopdesk_orders::{
    CancellationActor, CustomerSnapshot, LineItem, NewOrder, Order, OrderPatch, OrderStatus, ShippingAddress,
    StatusChange,
};

use crate::config::EngineConfig;
use crate::engine::OrderEngine;
use crate::query::{OrderQuery, OrderSort};
use crate::retry::RetryPolicy;
use crate::store::{InMemoryOrderStore, OrderStore, StoreError, WritePrecondition};

pub(crate) fn new_order(order_number: &str) -> NewOrder {
    new_order_for(order_number, Some(UserId::new()))
}

pub(crate) fn new_order_for(order_number: &str, user_id: Option<UserId>) -> NewOrder {
    NewOrder {
        id: OrderId::new(),
        order_number: order_number.to_string(),
        customer: CustomerSnapshot {
            user_id,
            name: "Grace Hopper".to_string(),
            email: "grace@example.com".to_string(),
            phone: Some("555-0100".to_string()),
        },
        shipping_address: ShippingAddress {
            line1: "1 Compiler Way".to_string(),
            line2: None,
            city: "Arlington".to_string(),
            postal_code: "22201".to_string(),
            country: "US".to_string(),
        },
        payment_method: "cod".to_string(),
        items: vec![LineItem {
            product_id: ProductId::new(),
            name: "Wool scarf".to_string(),
            quantity: 1,
            unit_price: Money::from_minor(3900),
            size: None,
            color: Some("navy".to_string()),
        }],
        shipping_cost: Money::from_minor(400),
        tax: Money::from_minor(0),
    }
}

pub(crate) async fn place(store: &dyn OrderStore, order_number: &str) -> Order {
    place_at(store, order_number, Utc::now()).await
}

pub(crate) async fn place_at(store: &dyn OrderStore, order_number: &str, created_at: DateTime<Utc>) -> Order {
    let order = Order::place(new_order(order_number), created_at).unwrap();
    store.insert(&order).await.unwrap();
    order
}

/// Force an order into `status` through the store, bypassing the engine.
pub(crate) async fn force_status(store: &dyn OrderStore, order: &Order, status: OrderStatus) -> Order {
    let current = store.find(*order.id()).await.unwrap().unwrap();
    let patch = OrderPatch::from(
        current
            .plan_status_change(&StatusChange::to(status), CancellationActor::Admin, Utc::now())
            .unwrap(),
    );
    store
        .update(*order.id(), WritePrecondition::for_patch(current.version(), &patch), &patch, Utc::now())
        .await
        .unwrap()
}

pub(crate) fn test_config() -> EngineConfig {
    EngineConfig {
        bulk_concurrency: 4,
        default_window_days: 7,
        store_timeout: Duration::from_millis(200),
        write_conflict_retries: 5,
        store_retry: RetryPolicy::exponential(3, Duration::from_millis(1), Duration::from_millis(5)),
    }
}

pub(crate) fn engine() -> (Arc<InMemoryOrderStore>, OrderEngine) {
    let store = Arc::new(InMemoryOrderStore::new());
    let engine = OrderEngine::new(store.clone(), test_config());
    (store, engine)
}

/// Where a flaky connection drops a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AckLoss {
    /// The write commits, then the ack is lost.
    AfterCommit,
    /// The write never reaches the store.
    BeforeCommit,
}

/// In-memory store whose first `failures` writes report `Unavailable`.
pub(crate) struct FlakyStore {
    pub(crate) inner: InMemoryOrderStore,
    loss: AckLoss,
    failures: AtomicU32,
    pub(crate) writes: AtomicU32,
}

impl FlakyStore {
    pub(crate) fn new(loss: AckLoss, failures: u32) -> Self {
        Self {
            inner: InMemoryOrderStore::new(),
            loss,
            failures: AtomicU32::new(failures),
            writes: AtomicU32::new(0),
        }
    }

    fn fail_this_write(&self) -> bool {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn write<T, Fut>(&self, fut: Fut) -> Result<T, StoreError>
    where
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        if !self.fail_this_write() {
            return fut.await;
        }
        match self.loss {
            AckLoss::AfterCommit => {
                fut.await?;
                Err(StoreError::Unavailable("connection reset after commit".to_string()))
            }
            AckLoss::BeforeCommit => Err(StoreError::Unavailable("connection refused".to_string())),
        }
    }
}

#[async_trait::async_trait]
impl OrderStore for FlakyStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        self.write(self.inner.insert(order)).await
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.inner.find(id).await
    }

    async fn find_many(&self, query: &OrderQuery, sort: OrderSort) -> Result<Vec<Order>, StoreError> {
        self.inner.find_many(query, sort).await
    }

    async fn update(
        &self,
        id: OrderId,
        precondition: WritePrecondition,
        patch: &OrderPatch,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        self.write(self.inner.update(id, precondition, patch, now)).await
    }

    async fn delete(&self, id: OrderId) -> Result<(), StoreError> {
        self.write(self.inner.delete(id)).await
    }
}

/// Engine over a [`FlakyStore`] seeded with one pending order.
pub(crate) async fn flaky_engine(loss: AckLoss, failures: u32) -> (Arc<FlakyStore>, OrderEngine, Order) {
    let store = Arc::new(FlakyStore::new(loss, 0));
    let order = place(&store.inner, "SD-7001").await;
    store.failures.store(failures, Ordering::SeqCst);
    let engine = OrderEngine::new(store.clone(), test_config());
    (store, engine, order)
}
