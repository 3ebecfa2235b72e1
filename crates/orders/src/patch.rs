//! Typed write patches.
//!
//! Each write path has its own fixed patch shape. Storage adapters apply
//! patches field by field; there is no generic merge, so a payment write can
//! never touch status and a status write can never touch `admin_notes`.

use chrono::{DateTime, Utc};

use crate::cancellation::CancellationRecord;
use crate::error::OrderError;
use crate::order::Order;
use crate::status::OrderStatus;

/// Output of an allowed status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPatch {
    pub status: OrderStatus,
    /// `None` keeps the stored tracking number.
    pub tracking_number: Option<String>,
    /// `None` keeps the stored notes.
    pub notes: Option<String>,
    /// Present exactly when this patch moves the order into `Cancelled`.
    pub cancellation: Option<CancellationRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentPatch {
    pub is_paid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminNotesPatch {
    pub admin_notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderPatch {
    Status(StatusPatch),
    Payment(PaymentPatch),
    AdminNotes(AdminNotesPatch),
}

impl From<StatusPatch> for OrderPatch {
    fn from(value: StatusPatch) -> Self {
        OrderPatch::Status(value)
    }
}

impl From<PaymentPatch> for OrderPatch {
    fn from(value: PaymentPatch) -> Self {
        OrderPatch::Payment(value)
    }
}

impl From<AdminNotesPatch> for OrderPatch {
    fn from(value: AdminNotesPatch) -> Self {
        OrderPatch::AdminNotes(value)
    }
}

impl OrderPatch {
    /// Whether the write must be conditional on the order not being cancelled.
    pub fn requires_not_cancelled(&self) -> bool {
        !matches!(self, OrderPatch::AdminNotes(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OrderPatch::Status(_) => "status",
            OrderPatch::Payment(_) => "payment",
            OrderPatch::AdminNotes(_) => "admin_notes",
        }
    }

    /// Apply the patch to an in-memory order, bumping its version.
    ///
    /// Re-checks the frozen-after-cancellation rules against the order being
    /// written, so a stale plan can never overwrite a cancelled order.
    pub fn apply_to(&self, order: &mut Order, now: DateTime<Utc>) -> Result<(), OrderError> {
        match self {
            OrderPatch::Status(patch) => {
                if order.is_cancelled() {
                    return Err(OrderError::OrderCancelledCannotModify);
                }
                if let (Some(_), Some(existing)) = (&patch.cancellation, &order.cancellation) {
                    return Err(OrderError::CancellationAlreadyRecorded {
                        recorded_at: existing.cancelled_at,
                    });
                }
                if (patch.status == OrderStatus::Cancelled) != patch.cancellation.is_some() {
                    return Err(OrderError::validation(
                        "cancellation record must accompany exactly the move into Cancelled",
                    ));
                }

                order.status = patch.status;
                if let Some(tracking) = &patch.tracking_number {
                    order.tracking_number = Some(tracking.clone());
                }
                if let Some(notes) = &patch.notes {
                    order.notes = Some(notes.clone());
                }
                if let Some(record) = &patch.cancellation {
                    order.cancellation = Some(record.clone());
                }
            }
            OrderPatch::Payment(patch) => {
                if order.is_cancelled() {
                    return Err(OrderError::OrderCancelledImmutable);
                }
                order.is_paid = patch.is_paid;
            }
            OrderPatch::AdminNotes(patch) => {
                order.admin_notes = Some(patch.admin_notes.clone());
            }
        }

        order.updated_at = now;
        order.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationActor;
    use crate::order::StatusChange;
    use crate::order::tests::{placed, test_time};
    use proptest::prelude::*;
    use shopdesk_core::AggregateRoot;

    #[test]
    fn payment_patch_touches_only_is_paid() {
        let mut order = placed("SD-2001");
        let before = order.clone();

        OrderPatch::from(order.plan_payment(true).unwrap())
            .apply_to(&mut order, test_time())
            .unwrap();

        assert!(order.is_paid());
        assert_eq!(order.status(), before.status());
        assert_eq!(order.notes(), before.notes());
        assert_eq!(order.tracking_number(), before.tracking_number());
        assert_eq!(order.version(), before.version() + 1);
    }

    #[test]
    fn stale_cancellation_plan_cannot_overwrite_record() {
        let mut order = placed("SD-2002");
        let first = order
            .plan_status_change(&StatusChange::to(OrderStatus::Cancelled), CancellationActor::User, test_time())
            .unwrap();
        let stale = first.clone();

        OrderPatch::from(first).apply_to(&mut order, test_time()).unwrap();
        let recorded = order.cancellation().cloned().unwrap();

        let err = OrderPatch::from(stale).apply_to(&mut order, test_time()).unwrap_err();
        assert_eq!(err, OrderError::OrderCancelledCannotModify);
        assert_eq!(order.cancellation(), Some(&recorded));
    }

    #[test]
    fn cancellation_record_without_cancelled_status_is_rejected() {
        let mut order = placed("SD-2003");
        let mut patch = order
            .plan_status_change(&StatusChange::to(OrderStatus::Cancelled), CancellationActor::Admin, test_time())
            .unwrap();
        patch.status = OrderStatus::Processing;

        let err = OrderPatch::from(patch).apply_to(&mut order, test_time()).unwrap_err();
        assert_eq!(err.code(), "ValidationError");
        assert!(order.cancellation().is_none());
    }

    #[test]
    fn admin_notes_are_not_guarded_by_cancellation() {
        assert!(!OrderPatch::from(AdminNotesPatch { admin_notes: String::new() }).requires_not_cancelled());
        assert!(OrderPatch::from(PaymentPatch { is_paid: true }).requires_not_cancelled());
    }

    fn non_cancelling_status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(vec![
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ])
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: payment toggles commute with non-cancelling status moves;
        /// the final `is_paid` is the last payment write and the final status is
        /// the last status write, however the two streams interleave.
        #[test]
        fn payment_commutes_with_status_transitions(
            payments in prop::collection::vec(any::<bool>(), 1..8),
            statuses in prop::collection::vec(non_cancelling_status(), 1..8),
            payments_first in any::<bool>(),
        ) {
            let mut interleaved = placed("SD-2100");
            let mut sequential = interleaved.clone();

            let steps = payments.len().max(statuses.len());
            for i in 0..steps {
                let mut step: Vec<OrderPatch> = Vec::new();
                if let Some(paid) = payments.get(i) {
                    step.push(interleaved.plan_payment(*paid).unwrap().into());
                }
                if let Some(status) = statuses.get(i) {
                    step.push(
                        interleaved
                            .plan_status_change(&StatusChange::to(*status), CancellationActor::Admin, test_time())
                            .unwrap()
                            .into(),
                    );
                }
                if !payments_first {
                    step.reverse();
                }
                for patch in step {
                    patch.apply_to(&mut interleaved, test_time()).unwrap();
                }
            }

            for status in &statuses {
                let patch = sequential
                    .plan_status_change(&StatusChange::to(*status), CancellationActor::Admin, test_time())
                    .unwrap();
                OrderPatch::from(patch).apply_to(&mut sequential, test_time()).unwrap();
            }
            for paid in &payments {
                OrderPatch::from(sequential.plan_payment(*paid).unwrap())
                    .apply_to(&mut sequential, test_time())
                    .unwrap();
            }

            prop_assert_eq!(interleaved.is_paid(), *payments.last().unwrap());
            prop_assert_eq!(interleaved.is_paid(), sequential.is_paid());
            prop_assert_eq!(interleaved.status(), sequential.status());
        }
    }
}
