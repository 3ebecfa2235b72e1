//! Request/response DTOs and JSON mapping helpers.
//!
//! Field names follow the storefront's camelCase JSON. Money amounts are
//! integer minor units.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shopdesk_core::{AggregateRoot, Money, OrderId, UserId};
use shopdesk_infra::{BulkOutcome, OrderFilter, OrderSort};
use shopdesk_orders::{Order, OrderStatus, StatusChange};

use crate::app::errors::validation_error;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: String,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
}

impl UpdateStatusRequest {
    pub fn to_change(&self) -> Result<StatusChange, axum::response::Response> {
        status_change(&self.status, &self.tracking_number, &self.notes, &self.cancellation_reason)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatusRequest {
    pub order_ids: Vec<String>,
    pub status: String,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
}

impl BulkStatusRequest {
    pub fn to_change(&self) -> Result<StatusChange, axum::response::Response> {
        status_change(&self.status, &self.tracking_number, &self.notes, &self.cancellation_reason)
    }
}

fn status_change(
    status: &str,
    tracking_number: &Option<String>,
    notes: &Option<String>,
    cancellation_reason: &Option<String>,
) -> Result<StatusChange, axum::response::Response> {
    let status: OrderStatus = status.parse().map_err(|e| validation_error(format!("{e}")))?;

    let mut change = StatusChange::to(status);
    if let Some(t) = non_blank(tracking_number) {
        change = change.with_tracking_number(t);
    }
    if let Some(n) = non_blank(notes) {
        change = change.with_notes(n);
    }
    if let Some(r) = non_blank(cancellation_reason) {
        change = change.with_cancellation_reason(r);
    }
    Ok(change)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentRequest {
    pub is_paid: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminNotesRequest {
    pub admin_notes: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerCancelRequest {
    pub reason: Option<String>,
}

/// Query string for `GET /orders`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    pub date_from: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    pub date_to: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
}

impl ListOrdersQuery {
    pub fn to_filter(&self) -> Result<OrderFilter, axum::response::Response> {
        let status = match non_blank(&self.status) {
            None => None,
            Some(s) if s.eq_ignore_ascii_case("all") => None,
            Some(s) => Some(s.parse::<OrderStatus>().map_err(|e| validation_error(format!("{e}")))?),
        };

        Ok(OrderFilter {
            status,
            date_from: parse_day("dateFrom", &self.date_from)?,
            date_to: parse_day("dateTo", &self.date_to)?,
            free_text: non_blank(&self.search).map(str::to_string),
        })
    }

    pub fn to_sort(&self) -> Result<OrderSort, axum::response::Response> {
        let mut sort = OrderSort::default();
        if let Some(field) = non_blank(&self.sort) {
            sort.field = field.parse().map_err(|e| validation_error(format!("{e}")))?;
        }
        if let Some(direction) = non_blank(&self.direction) {
            sort.direction = direction.parse().map_err(|e| validation_error(format!("{e}")))?;
        }
        Ok(sort)
    }
}

fn parse_day(field: &str, value: &Option<String>) -> Result<Option<NaiveDate>, axum::response::Response> {
    non_blank(value)
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| validation_error(format!("{field} must be a YYYY-MM-DD date, got '{s}'")))
        })
        .transpose()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemView {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    pub user_id: Option<UserId>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressView {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub order_number: String,
    pub status: &'static str,
    pub is_paid: bool,
    pub items: Vec<LineItemView>,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub tax: Money,
    pub total: Money,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub cancelled_by: Option<&'static str>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub customer: CustomerView,
    pub shipping_address: AddressView,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    /// Whether the admin UI may include this order in a bulk selection.
    pub selectable: bool,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        let cancellation = order.cancellation();
        let customer = order.customer();
        let address = order.shipping_address();

        Self {
            id: *order.id(),
            order_number: order.order_number().to_string(),
            status: order.status().as_str(),
            is_paid: order.is_paid(),
            items: order
                .items()
                .iter()
                .map(|item| LineItemView {
                    product_id: item.product_id.to_string(),
                    name: item.name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    size: item.size.clone(),
                    color: item.color.clone(),
                })
                .collect(),
            subtotal: order.subtotal(),
            shipping_cost: order.shipping_cost(),
            tax: order.tax(),
            total: order.total(),
            tracking_number: order.tracking_number().map(str::to_string),
            notes: order.notes().map(str::to_string),
            admin_notes: order.admin_notes().map(str::to_string),
            cancelled_by: cancellation.map(|c| c.cancelled_by.as_str()),
            cancelled_at: cancellation.map(|c| c.cancelled_at),
            cancellation_reason: cancellation.and_then(|c| c.reason.clone()),
            customer: CustomerView {
                user_id: customer.user_id,
                name: customer.name.clone(),
                email: customer.email.clone(),
                phone: customer.phone.clone(),
            },
            shipping_address: AddressView {
                line1: address.line1.clone(),
                line2: address.line2.clone(),
                city: address.city.clone(),
                postal_code: address.postal_code.clone(),
                country: address.country.clone(),
            },
            payment_method: order.payment_method().to_string(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            version: order.version(),
            selectable: order.is_bulk_selectable(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailureView {
    /// The id as submitted; malformed ids are echoed back verbatim.
    pub order_id: String,
    pub error: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkStatusResponse {
    pub requested: usize,
    pub updated_count: usize,
    pub failed_count: usize,
    pub summary: String,
    pub succeeded: Vec<OrderId>,
    pub failed: Vec<BulkFailureView>,
    pub orders: Vec<OrderView>,
}

impl BulkStatusResponse {
    /// Combine the engine outcome with ids rejected before reaching it.
    pub fn new(outcome: BulkOutcome, mut malformed: Vec<BulkFailureView>) -> Self {
        let requested = outcome.requested + malformed.len();
        let succeeded = outcome.succeeded_ids();

        let mut failed: Vec<BulkFailureView> = outcome
            .failed
            .iter()
            .map(|f| BulkFailureView {
                order_id: f.order_id.to_string(),
                error: f.error.code(),
                message: f.error.to_string(),
            })
            .collect();
        failed.append(&mut malformed);

        Self {
            requested,
            updated_count: succeeded.len(),
            failed_count: failed.len(),
            summary: format!("updated {} of {}", succeeded.len(), requested),
            succeeded,
            failed,
            orders: outcome.succeeded.iter().map(OrderView::from).collect(),
        }
    }
}
