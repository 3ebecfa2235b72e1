//! Cancellation audit recorder and admin notes.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use shopdesk_core::OrderId;
use shopdesk_orders::{CancellationRecord, Order, OrderPatch};

use crate::error::EngineError;
use crate::lifecycle::OrderLifecycle;

/// Admin notes, which stay writable after cancellation, and the log side of
/// the one-time who/when/why record the lifecycle writes on cancel.
pub struct CancellationAuditRecorder {
    lifecycle: Arc<OrderLifecycle>,
}

impl CancellationAuditRecorder {
    pub fn new(lifecycle: Arc<OrderLifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Overwrite the admin notes. Allowed in every status.
    pub async fn set_admin_notes(&self, id: OrderId, text: impl Into<String>) -> Result<Order, EngineError> {
        let text = text.into();
        let order = self
            .lifecycle
            .mutate(id, "admin_notes", |order, _now| Ok(OrderPatch::from(order.plan_admin_notes(text.clone()))))
            .await?;

        tracing::info!(order_id = %id, "admin notes updated");
        Ok(order)
    }

    pub(crate) fn log_recorded(id: OrderId, record: &CancellationRecord) {
        tracing::info!(
            order_id = %id,
            actor = %record.cancelled_by,
            cancelled_at = %record.cancelled_at,
            has_reason = record.reason.is_some(),
            "cancellation recorded"
        );
    }

    /// A second cancellation record was attempted. Never ignored.
    pub(crate) fn report_duplicate(id: OrderId, recorded_at: DateTime<Utc>) -> EngineError {
        tracing::error!(
            order_id = %id,
            recorded_at = %recorded_at,
            "second cancellation record attempted; existing record kept"
        );
        EngineError::InternalConsistency(format!(
            "order {id} already has a cancellation recorded at {recorded_at}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{engine, place};
    use shopdesk_core::AggregateRoot;
    use shopdesk_orders::{CancellationActor, OrderStatus, StatusChange};

    #[tokio::test]
    async fn records_actor_time_and_reason_once() {
        let (store, engine) = engine();
        let order = place(&store, "SD-5001").await;

        let cancelled = engine
            .lifecycle()
            .transition(
                *order.id(),
                &StatusChange::to(OrderStatus::Cancelled).with_cancellation_reason(" payment timeout "),
                CancellationActor::System,
            )
            .await
            .unwrap();
        let record = cancelled.cancellation().cloned().unwrap();
        assert_eq!(record.cancelled_by, CancellationActor::System);
        assert_eq!(record.reason.as_deref(), Some("payment timeout"));

        let err = engine
            .lifecycle()
            .transition(*order.id(), &StatusChange::to(OrderStatus::Cancelled), CancellationActor::Admin)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "OrderCancelledCannotModify");

        let stored = engine.lifecycle().get(*order.id()).await.unwrap();
        assert_eq!(stored.cancellation(), Some(&record));
        assert_eq!(stored.version(), cancelled.version());
    }

    #[tokio::test]
    async fn admin_notes_are_writable_after_cancellation() {
        let (store, engine) = engine();
        let order = place(&store, "SD-5002").await;
        engine
            .lifecycle()
            .transition(*order.id(), &StatusChange::to(OrderStatus::Cancelled), CancellationActor::Admin)
            .await
            .unwrap();

        let first = engine.audit().set_admin_notes(*order.id(), "refund issued").await.unwrap();
        assert_eq!(first.admin_notes(), Some("refund issued"));

        let second = engine.audit().set_admin_notes(*order.id(), "customer called").await.unwrap();
        assert_eq!(second.admin_notes(), Some("customer called"));
        assert!(second.cancellation().is_some());
    }

    #[tokio::test]
    async fn admin_notes_require_existing_order() {
        let (_store, engine) = engine();
        let err = engine.audit().set_admin_notes(OrderId::new(), "x").await.unwrap_err();
        assert_eq!(err.code(), "OrderNotFound");
    }
}
