use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopdesk_core::{AggregateRoot, Money, OrderId, ProductId, UserId};

use crate::cancellation::{CancellationActor, CancellationRecord};
use crate::error::OrderError;
use crate::patch::{AdminNotesPatch, PaymentPatch, StatusPatch};
use crate::status::OrderStatus;
use crate::transition::{self, DenyReason, Transition, TransitionEffect};

/// Order line captured at checkout. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl LineItem {
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Customer contact details as they were at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    /// Storefront account that placed the order; `None` for guest checkout.
    pub user_id: Option<UserId>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Checkout payload used to place a new order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub id: OrderId,
    pub order_number: String,
    pub customer: CustomerSnapshot,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub items: Vec<LineItem>,
    pub shipping_cost: Money,
    pub tax: Money,
}

/// Requested status change, as submitted by staff or the bulk coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    /// Only used when `status` is `Cancelled`.
    pub cancellation_reason: Option<String>,
}

impl StatusChange {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            tracking_number: None,
            notes: None,
            cancellation_reason: None,
        }
    }

    pub fn with_tracking_number(mut self, tracking_number: impl Into<String>) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_cancellation_reason(mut self, reason: impl Into<String>) -> Self {
        self.cancellation_reason = Some(reason.into());
        self
    }
}

/// Every stored field of an order, for storage adapters rehydrating rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderParts {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub is_paid: bool,
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub tax: Money,
    pub total: Money,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub cancellation: Option<CancellationRecord>,
    pub customer: CustomerSnapshot,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// Aggregate root: Order.
///
/// Fields are private; the only write paths are the typed patches in
/// [`crate::patch`], which are produced by the `plan_*` methods below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub(crate) id: OrderId,
    pub(crate) order_number: String,
    pub(crate) status: OrderStatus,
    pub(crate) is_paid: bool,
    pub(crate) items: Vec<LineItem>,
    pub(crate) subtotal: Money,
    pub(crate) shipping_cost: Money,
    pub(crate) tax: Money,
    pub(crate) total: Money,
    pub(crate) tracking_number: Option<String>,
    pub(crate) notes: Option<String>,
    pub(crate) admin_notes: Option<String>,
    pub(crate) cancellation: Option<CancellationRecord>,
    pub(crate) customer: CustomerSnapshot,
    pub(crate) shipping_address: ShippingAddress,
    pub(crate) payment_method: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) version: u64,
}

impl Order {
    /// Place a new `Pending`, unpaid order, computing its amounts.
    pub fn place(new: NewOrder, now: DateTime<Utc>) -> Result<Self, OrderError> {
        let order_number = new.order_number.trim().to_string();
        if order_number.is_empty() {
            return Err(OrderError::validation("order_number must not be empty"));
        }
        if new.items.is_empty() {
            return Err(OrderError::validation("order must contain at least one item"));
        }
        if new.items.iter().any(|i| i.quantity == 0) {
            return Err(OrderError::validation("item quantity must be positive"));
        }

        let subtotal = new
            .items
            .iter()
            .try_fold(Money::ZERO, |acc, item| item.line_total().and_then(|t| acc.checked_add(t)))
            .ok_or_else(|| OrderError::validation("order subtotal overflows"))?;
        let total = subtotal
            .checked_add(new.shipping_cost)
            .and_then(|t| t.checked_add(new.tax))
            .ok_or_else(|| OrderError::validation("order total overflows"))?;

        Ok(Self {
            id: new.id,
            order_number,
            status: OrderStatus::Pending,
            is_paid: false,
            items: new.items,
            subtotal,
            shipping_cost: new.shipping_cost,
            tax: new.tax,
            total,
            tracking_number: None,
            notes: None,
            admin_notes: None,
            cancellation: None,
            customer: new.customer,
            shipping_address: new.shipping_address,
            payment_method: new.payment_method,
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    /// Rehydrate an order from storage.
    pub fn from_parts(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            order_number: parts.order_number,
            status: parts.status,
            is_paid: parts.is_paid,
            items: parts.items,
            subtotal: parts.subtotal,
            shipping_cost: parts.shipping_cost,
            tax: parts.tax,
            total: parts.total,
            tracking_number: parts.tracking_number,
            notes: parts.notes,
            admin_notes: parts.admin_notes,
            cancellation: parts.cancellation,
            customer: parts.customer,
            shipping_address: parts.shipping_address,
            payment_method: parts.payment_method,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            version: parts.version,
        }
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_paid(&self) -> bool {
        self.is_paid
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }

    pub fn tax(&self) -> Money {
        self.tax
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn admin_notes(&self) -> Option<&str> {
        self.admin_notes.as_deref()
    }

    pub fn cancellation(&self) -> Option<&CancellationRecord> {
        self.cancellation.as_ref()
    }

    pub fn customer(&self) -> &CustomerSnapshot {
        &self.customer
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }

    /// Whether the order may be offered for bulk selection (advisory only).
    pub fn is_bulk_selectable(&self) -> bool {
        !self.is_cancelled()
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Order {
    /// Decide the patch for a requested status change. Does not mutate.
    ///
    /// Cancelled orders reject every status-path write with
    /// `OrderCancelledCannotModify`; `Returned` is denied by the validator as
    /// `TerminalState`.
    pub fn plan_status_change(
        &self,
        change: &StatusChange,
        actor: CancellationActor,
        now: DateTime<Utc>,
    ) -> Result<StatusPatch, OrderError> {
        if self.is_cancelled() {
            return Err(OrderError::OrderCancelledCannotModify);
        }

        let effect = match transition::validate(self.status, change.status) {
            Transition::Allow(effect) => effect,
            Transition::Deny(DenyReason::TerminalState) => {
                return Err(OrderError::TerminalState {
                    from: self.status,
                    to: change.status,
                });
            }
        };

        let cancellation = match effect {
            TransitionEffect::RecordCancellation => Some(CancellationRecord::first_for(
                self,
                actor,
                change.cancellation_reason.clone(),
                now,
            )?),
            TransitionEffect::None => None,
        };

        Ok(StatusPatch {
            status: change.status,
            tracking_number: non_blank(change.tracking_number.as_deref()),
            notes: non_blank(change.notes.as_deref()),
            cancellation,
        })
    }

    /// Customer self-service cancellation of their own order.
    pub fn plan_customer_cancellation(
        &self,
        customer: UserId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<StatusPatch, OrderError> {
        if self.customer.user_id != Some(customer) {
            return Err(OrderError::NotOrderOwner);
        }
        if self.is_cancelled() {
            return Err(OrderError::OrderCancelledCannotModify);
        }
        if !matches!(self.status, OrderStatus::Pending | OrderStatus::Processing) {
            return Err(OrderError::NotCancellableByCustomer(self.status));
        }

        let change = StatusChange {
            status: OrderStatus::Cancelled,
            tracking_number: None,
            notes: None,
            cancellation_reason: reason,
        };
        self.plan_status_change(&change, CancellationActor::User, now)
    }

    /// Decide the patch for a payment reconciliation write.
    pub fn plan_payment(&self, is_paid: bool) -> Result<PaymentPatch, OrderError> {
        if self.is_cancelled() {
            return Err(OrderError::OrderCancelledImmutable);
        }
        Ok(PaymentPatch { is_paid })
    }

    /// Admin notes stay writable in every status, terminal ones included.
    pub fn plan_admin_notes(&self, text: impl Into<String>) -> AdminNotesPatch {
        AdminNotesPatch {
            admin_notes: text.into(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
