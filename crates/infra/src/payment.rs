//! Payment reconciliation: the `is_paid` flag's own write path.

use std::sync::Arc;

use shopdesk_core::OrderId;
use shopdesk_orders::{Order, OrderPatch};

use crate::error::EngineError;
use crate::lifecycle::OrderLifecycle;

/// Overwrites `is_paid` independently of fulfillment status. No history is
/// kept; the flag is frozen once the order is cancelled.
pub struct PaymentReconciliation {
    lifecycle: Arc<OrderLifecycle>,
}

impl PaymentReconciliation {
    pub fn new(lifecycle: Arc<OrderLifecycle>) -> Self {
        Self { lifecycle }
    }

    pub async fn set_paid(&self, id: OrderId, is_paid: bool) -> Result<Order, EngineError> {
        let order = self
            .lifecycle
            .mutate(id, "payment", |order, _now| order.plan_payment(is_paid).map(OrderPatch::from))
            .await?;

        tracing::info!(order_id = %id, is_paid, status = %order.status(), "payment reconciled");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{engine, force_status, place};
    use shopdesk_core::AggregateRoot;
    use shopdesk_orders::OrderStatus;

    #[tokio::test]
    async fn toggles_without_touching_status() {
        let (store, engine) = engine();
        let order = place(&store, "SD-6001").await;
        force_status(&store, &order, OrderStatus::Delivered).await;

        let paid = engine.payment().set_paid(*order.id(), true).await.unwrap();
        assert!(paid.is_paid());
        assert_eq!(paid.status(), OrderStatus::Delivered);

        let unpaid = engine.payment().set_paid(*order.id(), false).await.unwrap();
        assert!(!unpaid.is_paid());
        assert_eq!(unpaid.version(), paid.version() + 1);
    }

    #[tokio::test]
    async fn returned_orders_can_still_be_reconciled() {
        let (store, engine) = engine();
        let order = place(&store, "SD-6002").await;
        force_status(&store, &order, OrderStatus::Returned).await;

        let refunded = engine.payment().set_paid(*order.id(), false).await.unwrap();
        assert_eq!(refunded.status(), OrderStatus::Returned);
    }

    #[tokio::test]
    async fn cancelled_orders_are_frozen() {
        let (store, engine) = engine();
        let order = place(&store, "SD-6003").await;
        force_status(&store, &order, OrderStatus::Cancelled).await;

        let err = engine.payment().set_paid(*order.id(), true).await.unwrap_err();
        assert_eq!(err.code(), "OrderCancelledImmutable");
        assert!(!engine.lifecycle().get(*order.id()).await.unwrap().is_paid());
    }
}
