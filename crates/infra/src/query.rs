//! Query/filter projector: filtered, sorted order listings.
//!
//! Read-only. A filter is first resolved against "today" into an
//! [`OrderQuery`] with concrete UTC bounds, which every store evaluates the
//! same way.

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use shopdesk_core::AggregateRoot;
use shopdesk_orders::{Order, OrderStatus};

use crate::error::EngineError;
use crate::retry::StoreGuard;
use crate::store::OrderStore;

/// Listing filter as submitted by the admin UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Inclusive first day (UTC).
    pub date_from: Option<NaiveDate>,
    /// Inclusive last day (UTC).
    pub date_to: Option<NaiveDate>,
    pub free_text: Option<String>,
}

/// A filter with its date window resolved to concrete UTC instants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
    /// Lower-cased search needle.
    pub text: Option<String>,
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

fn day_after(day: NaiveDate) -> Option<DateTime<Utc>> {
    day.checked_add_days(Days::new(1)).map(start_of)
}

impl OrderFilter {
    /// Resolve the date window.
    ///
    /// With neither bound set, the window is the trailing `window_days` whole
    /// days ending with `today`. A single bound leaves the other side open.
    pub fn resolve(&self, today: NaiveDate, window_days: u32) -> Result<OrderQuery, EngineError> {
        let (created_from, created_before) = match (self.date_from, self.date_to) {
            (None, None) => {
                let back = u64::from(window_days.max(1) - 1);
                let first = today
                    .checked_sub_days(Days::new(back))
                    .ok_or_else(|| EngineError::validation("date window out of range"))?;
                (Some(start_of(first)), day_after(today))
            }
            (from, to) => {
                if let (Some(from), Some(to)) = (from, to) {
                    if from > to {
                        return Err(EngineError::validation(format!(
                            "dateFrom {from} is after dateTo {to}"
                        )));
                    }
                }
                (from.map(start_of), to.and_then(day_after))
            }
        };

        let text = self
            .free_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        Ok(OrderQuery {
            status: self.status,
            created_from,
            created_before,
            text,
        })
    }
}

impl OrderQuery {
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(status) = self.status {
            if order.status() != status {
                return false;
            }
        }
        if let Some(from) = self.created_from {
            if order.created_at() < from {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if order.created_at() >= before {
                return false;
            }
        }
        match &self.text {
            Some(needle) => searchable_fields(order).any(|field| field.to_lowercase().contains(needle)),
            None => true,
        }
    }
}

/// Fields the free-text search looks at.
fn searchable_fields(order: &Order) -> impl Iterator<Item = &str> {
    let customer = order.customer();
    [
        Some(order.order_number()),
        Some(customer.name.as_str()),
        Some(customer.email.as_str()),
        customer.phone.as_deref(),
        Some(order.status().as_str()),
        Some(order.payment_method()),
    ]
    .into_iter()
    .flatten()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    OrderNumber,
    Total,
    Status,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::OrderNumber => "orderNumber",
            SortField::Total => "total",
            SortField::Status => "status",
        }
    }
}

impl FromStr for SortField {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "").as_str() {
            "createdat" | "date" => Ok(SortField::CreatedAt),
            "updatedat" => Ok(SortField::UpdatedAt),
            "ordernumber" => Ok(SortField::OrderNumber),
            "total" => Ok(SortField::Total),
            "status" => Ok(SortField::Status),
            _ => Err(EngineError::validation(format!("unknown sort field '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            _ => Err(EngineError::validation(format!("unknown sort direction '{s}'"))),
        }
    }
}

/// Sort order for listings. Ties always break on ascending order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for OrderSort {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl OrderSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn compare(&self, a: &Order, b: &Order) -> Ordering {
        let primary = match self.field {
            SortField::CreatedAt => a.created_at().cmp(&b.created_at()),
            SortField::UpdatedAt => a.updated_at().cmp(&b.updated_at()),
            SortField::OrderNumber => a.order_number().cmp(b.order_number()),
            SortField::Total => a.total().cmp(&b.total()),
            SortField::Status => a.status().cmp(&b.status()),
        };
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id().cmp(b.id()))
    }
}

/// Stateless read side over the order store.
pub struct QueryProjector {
    store: Arc<dyn OrderStore>,
    guard: StoreGuard,
    window_days: u32,
}

impl QueryProjector {
    pub fn new(store: Arc<dyn OrderStore>, guard: StoreGuard, window_days: u32) -> Self {
        Self {
            store,
            guard,
            window_days,
        }
    }

    pub async fn list(&self, filter: &OrderFilter, sort: OrderSort) -> Result<Vec<Order>, EngineError> {
        self.list_as_of(filter, sort, Utc::now().date_naive()).await
    }

    /// List with the default window anchored on `today`.
    pub async fn list_as_of(
        &self,
        filter: &OrderFilter,
        sort: OrderSort,
        today: NaiveDate,
    ) -> Result<Vec<Order>, EngineError> {
        let query = filter.resolve(today, self.window_days)?;
        let orders = self
            .guard
            .call("find_many", || self.store.find_many(&query, sort))
            .await?;

        tracing::debug!(count = orders.len(), sort = sort.field.as_str(), "order listing");
        Ok(orders)
    }
}
