//! Order lifecycle service: the read-plan-conditional-write loop every
//! mutation goes through.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};

use shopdesk_core::{AggregateRoot, OrderId, UserId};
use shopdesk_orders::{CancellationActor, NewOrder, Order, OrderError, OrderPatch, StatusChange};

use crate::audit::CancellationAuditRecorder;
use crate::error::EngineError;
use crate::retry::StoreGuard;
use crate::store::{OrderStore, StoreError, WritePrecondition};

pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
    guard: StoreGuard,
    conflict_retries: u32,
}

impl OrderLifecycle {
    pub fn new(store: Arc<dyn OrderStore>, guard: StoreGuard, conflict_retries: u32) -> Self {
        Self {
            store,
            guard,
            conflict_retries,
        }
    }

    /// Persist a newly placed `Pending` order.
    pub async fn place(&self, new: NewOrder) -> Result<Order, EngineError> {
        let order = Order::place(new, write_clock())?;
        let seed = seed_for(*order.id());

        let mut outages = 0;
        loop {
            match self.guard.call_once("insert", self.store.insert(&order)).await {
                Ok(()) => break,
                Err(StoreError::Unavailable(msg)) => {
                    if self.find_after_outage(*order.id()).await?.as_ref() == Some(&order) {
                        tracing::warn!(order_id = %order.id(), reason = %msg, "insert acknowledged late; confirmed on re-read");
                        break;
                    }
                    outages += 1;
                    self.wait_out(*order.id(), "insert", outages, seed, msg).await?;
                }
                Err(other) => return Err(other.into()),
            }
        }

        tracing::info!(order_id = %order.id(), order_number = order.order_number(), "order placed");
        Ok(order)
    }

    pub async fn get(&self, id: OrderId) -> Result<Order, EngineError> {
        self.guard
            .call("find", || self.store.find(id))
            .await?
            .ok_or(EngineError::NotFound(id))
    }

    /// Single-order status transition. The bulk coordinator runs this same
    /// path once per id.
    pub async fn transition(
        &self,
        id: OrderId,
        change: &StatusChange,
        actor: CancellationActor,
    ) -> Result<Order, EngineError> {
        let order = self
            .mutate(id, "status", |order, now| {
                order.plan_status_change(change, actor, now).map(OrderPatch::from)
            })
            .await?;

        tracing::info!(
            order_id = %id,
            status = %order.status(),
            actor = %actor,
            "order status updated"
        );
        if let Some(record) = order.cancellation() {
            CancellationAuditRecorder::log_recorded(id, record);
        }
        Ok(order)
    }

    /// A customer cancelling their own pending/processing order.
    pub async fn customer_cancel(
        &self,
        id: OrderId,
        customer: UserId,
        reason: Option<String>,
    ) -> Result<Order, EngineError> {
        let order = self
            .mutate(id, "customer_cancel", |order, now| {
                order
                    .plan_customer_cancellation(customer, reason.clone(), now)
                    .map(OrderPatch::from)
            })
            .await?;

        if let Some(record) = order.cancellation() {
            CancellationAuditRecorder::log_recorded(id, record);
        }
        Ok(order)
    }

    /// Administrative hard delete; bypasses the state machine.
    pub async fn delete(&self, id: OrderId) -> Result<(), EngineError> {
        let mut outages = 0;
        loop {
            match self.guard.call_once("delete", self.store.delete(id)).await {
                Ok(()) => break,
                Err(StoreError::Unavailable(msg)) => {
                    if self.find_after_outage(id).await?.is_none() {
                        tracing::warn!(order_id = %id, reason = %msg, "delete acknowledged late; confirmed on re-read");
                        break;
                    }
                    outages += 1;
                    self.wait_out(id, "delete", outages, seed_for(id), msg).await?;
                }
                Err(other) => return Err(other.into()),
            }
        }
        tracing::info!(order_id = %id, "order deleted");
        Ok(())
    }

    /// Read the order, plan a patch and write it conditionally on the version
    /// that was read. A lost race re-reads and re-plans, so the patch is
    /// always decided against the state it is written over.
    ///
    /// The write itself is sent once per plan. When its outcome is unknown
    /// (timeout, dropped connection) the order is re-read: if it holds exactly
    /// what this plan wrote, the write landed and is reported as such.
    pub(crate) async fn mutate<P>(&self, id: OrderId, operation: &'static str, plan: P) -> Result<Order, EngineError>
    where
        P: Fn(&Order, DateTime<Utc>) -> Result<OrderPatch, OrderError>,
    {
        let seed = seed_for(id);
        let mut conflicts = 0;
        let mut outages = 0;
        loop {
            let current = self.get(id).await?;
            let now = write_clock();

            let patch = plan(&current, now).map_err(|e| denied(id, operation, e))?;
            let precondition = WritePrecondition::for_patch(current.version(), &patch);

            match self
                .guard
                .call_once("update", self.store.update(id, precondition, &patch, now))
                .await
            {
                Ok(order) => return Ok(order),
                Err(StoreError::Unavailable(msg)) => {
                    if let Some(order) = self.landed(id, &current, &patch, now).await? {
                        tracing::warn!(order_id = %id, operation, reason = %msg, "update acknowledged late; confirmed on re-read");
                        return Ok(order);
                    }
                    outages += 1;
                    self.wait_out(id, operation, outages, seed, msg).await?;
                }
                Err(StoreError::Conflict(msg)) if conflicts < self.conflict_retries => {
                    conflicts += 1;
                    tracing::warn!(order_id = %id, operation, attempt = conflicts, reason = %msg, "write conflict; re-reading");
                }
                Err(StoreError::Conflict(msg)) => {
                    tracing::warn!(order_id = %id, operation, attempts = conflicts + 1, "write conflict retries exhausted");
                    return Err(EngineError::Conflict(msg));
                }
                Err(StoreError::Rejected(e)) => return Err(denied(id, operation, e)),
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// The stored order, if it is exactly `read` with `patch` applied at `now`.
    async fn landed(
        &self,
        id: OrderId,
        read: &Order,
        patch: &OrderPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, EngineError> {
        let mut expected = read.clone();
        if patch.apply_to(&mut expected, now).is_err() {
            return Ok(None);
        }
        Ok(self
            .find_after_outage(id)
            .await?
            .filter(|stored| *stored == expected))
    }

    async fn find_after_outage(&self, id: OrderId) -> Result<Option<Order>, EngineError> {
        Ok(self.guard.call("find", || self.store.find(id)).await?)
    }

    /// Sleep before re-sending a write, or give up once the retry policy is
    /// spent.
    async fn wait_out(
        &self,
        id: OrderId,
        operation: &'static str,
        outages: u32,
        seed: u64,
        reason: String,
    ) -> Result<(), EngineError> {
        match self.guard.backoff(outages, seed) {
            Some(delay) => {
                tracing::warn!(
                    order_id = %id,
                    operation,
                    attempt = outages,
                    delay_ms = delay.as_millis() as u64,
                    reason = %reason,
                    "write did not land; retrying"
                );
                tokio::time::sleep(delay).await;
                Ok(())
            }
            None => {
                tracing::error!(order_id = %id, operation, attempts = outages, reason = %reason, "store unavailable");
                Err(EngineError::StoreUnavailable(reason))
            }
        }
    }
}

/// Write timestamps at the precision every store keeps, so a re-read order
/// compares equal to the one that was written.
fn write_clock() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Per-order backoff seed.
fn seed_for(id: OrderId) -> u64 {
    id.as_uuid().as_u128() as u64
}

fn denied(id: OrderId, operation: &'static str, err: OrderError) -> EngineError {
    if let OrderError::CancellationAlreadyRecorded { recorded_at } = err {
        return CancellationAuditRecorder::report_duplicate(id, recorded_at);
    }

    tracing::warn!(order_id = %id, operation, code = err.code(), reason = %err, "mutation denied");
    EngineError::Order(err)
}

/// Run an accepted mutation on its own task so it completes even if the
/// caller goes away.
pub async fn run_detached<T, F>(operation: &'static str, fut: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(result) => result,
        Err(join_err) => {
            tracing::error!(operation, error = %join_err, "detached mutation task failed");
            Err(EngineError::InternalConsistency(format!("{operation} task failed: {join_err}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::test_support::{AckLoss, engine, flaky_engine, force_status, new_order, new_order_for, place};
    use shopdesk_orders::OrderStatus;

    #[tokio::test]
    async fn pending_shipped_cancelled_keeps_tracking_and_freezes_payment() {
        let (store, engine) = engine();
        let o1 = place(&store, "SD-4001").await;
        let lifecycle = engine.lifecycle();

        let shipped = lifecycle
            .transition(*o1.id(), &StatusChange::to(OrderStatus::Shipped).with_tracking_number("TRK1"), CancellationActor::Admin)
            .await
            .unwrap();
        assert_eq!(shipped.tracking_number(), Some("TRK1"));

        let cancelled = lifecycle
            .transition(*o1.id(), &StatusChange::to(OrderStatus::Cancelled), CancellationActor::Admin)
            .await
            .unwrap();
        assert_eq!(cancelled.tracking_number(), Some("TRK1"));
        assert_eq!(cancelled.cancellation().map(|c| c.cancelled_by), Some(CancellationActor::Admin));

        let err = engine.payment().set_paid(*o1.id(), true).await.unwrap_err();
        assert_eq!(err.code(), "OrderCancelledImmutable");
    }

    #[tokio::test]
    async fn cancelled_order_rejects_status_changes() {
        let (store, engine) = engine();
        let order = place(&store, "SD-4002").await;
        force_status(&store, &order, OrderStatus::Cancelled).await;

        let err = engine
            .lifecycle()
            .transition(*order.id(), &StatusChange::to(OrderStatus::Pending).with_notes("reopen"), CancellationActor::Admin)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "OrderCancelledCannotModify");
        assert_eq!(engine.lifecycle().get(*order.id()).await.unwrap().notes(), None);
    }

    #[tokio::test]
    async fn returned_order_is_terminal() {
        let (store, engine) = engine();
        let order = place(&store, "SD-4003").await;
        force_status(&store, &order, OrderStatus::Returned).await;

        let err = engine
            .lifecycle()
            .transition(*order.id(), &StatusChange::to(OrderStatus::Delivered), CancellationActor::Admin)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TerminalState");
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (_store, engine) = engine();
        let err = engine
            .lifecycle()
            .transition(OrderId::new(), &StatusChange::to(OrderStatus::Shipped), CancellationActor::Admin)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "OrderNotFound");
    }

    #[tokio::test]
    async fn customer_can_cancel_only_own_early_orders() {
        let (_store, engine) = engine();
        let owner = UserId::new();
        let order = engine.lifecycle().place(new_order_for("SD-4004", Some(owner))).await.unwrap();

        let err = engine
            .lifecycle()
            .customer_cancel(*order.id(), UserId::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "Forbidden");

        let cancelled = engine
            .lifecycle()
            .customer_cancel(*order.id(), owner, Some("changed my mind".to_string()))
            .await
            .unwrap();
        let record = cancelled.cancellation().unwrap();
        assert_eq!(record.cancelled_by, CancellationActor::User);
        assert_eq!(record.reason.as_deref(), Some("changed my mind"));

        let shipped = engine.lifecycle().place(new_order_for("SD-4005", Some(owner))).await.unwrap();
        engine
            .lifecycle()
            .transition(*shipped.id(), &StatusChange::to(OrderStatus::Shipped), CancellationActor::Admin)
            .await
            .unwrap();
        let err = engine
            .lifecycle()
            .customer_cancel(*shipped.id(), owner, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NotCancellableByCustomer");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cancellations_record_exactly_once() {
        let (store, engine) = engine();
        let order = place(&store, "SD-4006").await;
        let lifecycle = engine.lifecycle().clone();

        let mut handles = Vec::new();
        for actor in [CancellationActor::Admin, CancellationActor::System, CancellationActor::User, CancellationActor::Admin] {
            let lifecycle = lifecycle.clone();
            let id = *order.id();
            handles.push(tokio::spawn(async move {
                lifecycle.transition(id, &StatusChange::to(OrderStatus::Cancelled), actor).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert_eq!(e.code(), "OrderCancelledCannotModify"),
            }
        }
        assert_eq!(winners, 1);

        let stored = lifecycle.get(*order.id()).await.unwrap();
        assert!(stored.cancellation().is_some());
        assert_eq!(stored.version(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_to_one_order_lose_no_updates() {
        let (store, engine) = engine();
        let order = place(&store, "SD-4007").await;

        let mut handles = Vec::new();
        for n in 0..4 {
            let audit = engine.audit().clone();
            let id = *order.id();
            handles.push(tokio::spawn(async move { audit.set_admin_notes(id, format!("note {n}")).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = engine.lifecycle().get(*order.id()).await.unwrap();
        assert_eq!(stored.version(), 5);
    }

    #[tokio::test]
    async fn cancellation_whose_ack_was_lost_reports_success() {
        let (store, engine, order) = flaky_engine(AckLoss::AfterCommit, 1).await;

        let cancelled = engine
            .lifecycle()
            .transition(*order.id(), &StatusChange::to(OrderStatus::Cancelled), CancellationActor::Admin)
            .await
            .unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);
        assert_eq!(cancelled.cancellation().map(|c| c.cancelled_by), Some(CancellationActor::Admin));
        assert_eq!(cancelled.version(), 2);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn write_refused_before_commit_is_resent_once() {
        let (store, engine, order) = flaky_engine(AckLoss::BeforeCommit, 2).await;

        let shipped = engine
            .lifecycle()
            .transition(*order.id(), &StatusChange::to(OrderStatus::Shipped).with_tracking_number("TRK9"), CancellationActor::Admin)
            .await
            .unwrap();
        assert_eq!(shipped.tracking_number(), Some("TRK9"));
        assert_eq!(shipped.version(), 2);
        assert_eq!(store.writes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn write_gives_up_once_store_stays_down() {
        let (_store, engine, order) = flaky_engine(AckLoss::BeforeCommit, 10).await;

        let err = engine
            .lifecycle()
            .transition(*order.id(), &StatusChange::to(OrderStatus::Shipped), CancellationActor::Admin)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "StoreUnavailable");
        assert_eq!(engine.lifecycle().get(*order.id()).await.unwrap().version(), 1);
    }

    #[tokio::test]
    async fn insert_and_delete_whose_ack_was_lost_report_success() {
        let (store, engine, _order) = flaky_engine(AckLoss::AfterCommit, 2).await;

        let placed = engine.lifecycle().place(new_order("SD-4008")).await.unwrap();
        assert_eq!(engine.lifecycle().get(*placed.id()).await.unwrap(), placed);

        engine.lifecycle().delete(*placed.id()).await.unwrap();
        let err = engine.lifecycle().get(*placed.id()).await.unwrap_err();
        assert_eq!(err.code(), "OrderNotFound");
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn detached_task_result_is_returned() {
        let value = run_detached("test", async { Ok::<_, EngineError>(42) }).await.unwrap();
        assert_eq!(value, 42);
    }
}
