//! Postgres-backed order store.
//!
//! One row per order (`crates/infra/migrations/0001_orders.sql`). Line items
//! and the shipping address are JSONB snapshots; amounts are minor units in
//! `BIGINT` columns.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (check violation) | `23514` | `Corrupt` |
//! | Database (other) | Any other | `Unavailable` |
//! | PoolTimedOut / PoolClosed / Io | N/A | `Unavailable` |
//! | ColumnDecode / Decode | N/A | `Corrupt` |
//!
//! ## Conditional updates
//!
//! `update` locks the row (`SELECT ... FOR UPDATE`), checks the precondition,
//! applies the typed patch in Rust and writes the mutable columns back with
//! `WHERE id = $1 AND version = $2 AND status <> 'Cancelled'` (the status
//! clause only for guarded patches), all in one transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, Postgres, QueryBuilder, Row};
use tracing::instrument;

use shopdesk_core::{AggregateRoot, Money, OrderId, UserId};
use shopdesk_orders::{
    CancellationActor, CancellationRecord, CustomerSnapshot, LineItem, Order, OrderParts, OrderPatch, OrderStatus,
    ShippingAddress,
};

use super::{OrderStore, StoreError, WritePrecondition, cancelled_rejection};
use crate::query::{OrderQuery, OrderSort, SortDirection, SortField};

const ORDER_COLUMNS: &str = "id, order_number, status, is_paid, items, subtotal, shipping_cost, tax, total, \
    tracking_number, notes, admin_notes, cancelled_by, cancelled_at, cancellation_reason, \
    customer_user_id, customer_name, customer_email, customer_phone, shipping_address, \
    payment_method, created_at, updated_at, version";

/// Columns the free-text search looks at.
const SEARCH_COLUMNS: [&str; 6] = [
    "order_number",
    "customer_name",
    "customer_email",
    "customer_phone",
    "status",
    "payment_method",
];

const MIGRATION: &str = include_str!("../../migrations/0001_orders.sql");

#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: Arc<PgPool>,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(MIGRATION)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl OrderStore for PostgresOrderStore {
    #[instrument(skip(self, order), fields(order_id = %order.id()), err)]
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let items = to_json("items", order.items())?;
        let address = to_json("shipping_address", order.shipping_address())?;
        let cancellation = order.cancellation();
        let customer = order.customer();

        sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)"
        ))
        .bind(order.id().as_uuid())
        .bind(order.order_number())
        .bind(order.status().as_str())
        .bind(order.is_paid())
        .bind(items)
        .bind(to_db_money(order.subtotal())?)
        .bind(to_db_money(order.shipping_cost())?)
        .bind(to_db_money(order.tax())?)
        .bind(to_db_money(order.total())?)
        .bind(order.tracking_number())
        .bind(order.notes())
        .bind(order.admin_notes())
        .bind(cancellation.map(|c| c.cancelled_by.as_str()))
        .bind(cancellation.map(|c| c.cancelled_at))
        .bind(cancellation.and_then(|c| c.reason.as_deref()))
        .bind(owner_uuid(customer))
        .bind(customer.name.as_str())
        .bind(customer.email.as_str())
        .bind(customer.phone.as_deref())
        .bind(address)
        .bind(order.payment_method())
        .bind(order.created_at())
        .bind(order.updated_at())
        .bind(to_db_version(order.version())?)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        Ok(())
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn find(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_order", e))?;

        row.map(|r| decode_order(&r)).transpose()
    }

    #[instrument(skip(self, query), err)]
    async fn find_many(&self, query: &OrderQuery, sort: OrderSort) -> Result<Vec<Order>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE TRUE"));

        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(from) = query.created_from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(before) = query.created_before {
            qb.push(" AND created_at < ").push_bind(before);
        }
        if let Some(needle) = &query.text {
            qb.push(" AND (");
            for (i, column) in SEARCH_COLUMNS.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(format!("strpos(lower(coalesce({column}, '')), "))
                    .push_bind(needle.clone())
                    .push(") > 0");
            }
            qb.push(")");
        }

        qb.push(" ORDER BY ")
            .push(sort_expression(sort.field))
            .push(match sort.direction {
                SortDirection::Asc => " ASC",
                SortDirection::Desc => " DESC",
            })
            .push(", id ASC");

        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_orders", e))?;

        rows.iter().map(decode_order).collect()
    }

    #[instrument(skip(self, patch, now), fields(order_id = %id, patch = patch.kind()), err)]
    async fn update(
        &self,
        id: OrderId,
        precondition: WritePrecondition,
        patch: &OrderPatch,
        now: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_order", e))?
            .ok_or(StoreError::NotFound(id))?;
        let stored = decode_order(&row)?;

        precondition
            .expected_version
            .check(stored.version())
            .map_err(|e| StoreError::Conflict(e.to_string()))?;
        if precondition.require_not_cancelled && stored.is_cancelled() {
            return Err(StoreError::Rejected(cancelled_rejection(patch)));
        }

        let mut next = stored.clone();
        patch.apply_to(&mut next, now).map_err(StoreError::Rejected)?;
        let cancellation = next.cancellation();

        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = $3,
                is_paid = $4,
                tracking_number = $5,
                notes = $6,
                admin_notes = $7,
                cancelled_by = $8,
                cancelled_at = $9,
                cancellation_reason = $10,
                updated_at = $11,
                version = $12
            WHERE id = $1 AND version = $2 AND ($13 = FALSE OR status <> 'Cancelled')
            "#,
        )
        .bind(id.as_uuid())
        .bind(to_db_version(stored.version())?)
        .bind(next.status().as_str())
        .bind(next.is_paid())
        .bind(next.tracking_number())
        .bind(next.notes())
        .bind(next.admin_notes())
        .bind(cancellation.map(|c| c.cancelled_by.as_str()))
        .bind(cancellation.map(|c| c.cancelled_at))
        .bind(cancellation.and_then(|c| c.reason.as_deref()))
        .bind(next.updated_at())
        .bind(to_db_version(next.version())?)
        .bind(precondition.require_not_cancelled)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Conflict(format!("order {id} changed during update")));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(next)
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn delete(&self, id: OrderId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

/// Lifecycle order for status sorts, matching `OrderStatus`'s `Ord`.
fn sort_expression(field: SortField) -> String {
    match field {
        SortField::CreatedAt => "created_at".to_string(),
        SortField::UpdatedAt => "updated_at".to_string(),
        SortField::OrderNumber => "order_number".to_string(),
        SortField::Total => "total".to_string(),
        SortField::Status => {
            let arms: String = OrderStatus::ALL
                .iter()
                .enumerate()
                .map(|(rank, status)| format!(" WHEN '{}' THEN {rank}", status.as_str()))
                .collect();
            format!("CASE status{arms} END")
        }
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                Some("23514") => StoreError::Corrupt(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("decode error in {operation}: {err}"))
        }
        other => StoreError::Unavailable(format!("sqlx error in {operation}: {other}")),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(column: &str, value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Corrupt(format!("cannot encode {column}: {e}")))
}

fn owner_uuid(customer: &CustomerSnapshot) -> Option<uuid::Uuid> {
    customer.user_id.map(|u| *u.as_uuid())
}

fn to_db_money(amount: Money) -> Result<i64, StoreError> {
    i64::try_from(amount.minor_units()).map_err(|_| StoreError::Corrupt(format!("amount {amount} exceeds BIGINT")))
}

fn to_db_version(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version).map_err(|_| StoreError::Corrupt(format!("version {version} exceeds BIGINT")))
}

fn from_db_amount(column: &str, value: i64) -> Result<Money, StoreError> {
    u64::try_from(value)
        .map(Money::from_minor)
        .map_err(|_| StoreError::Corrupt(format!("negative {column}: {value}")))
}

#[derive(Debug)]
struct OrderRow {
    id: uuid::Uuid,
    order_number: String,
    status: String,
    is_paid: bool,
    items: serde_json::Value,
    subtotal: i64,
    shipping_cost: i64,
    tax: i64,
    total: i64,
    tracking_number: Option<String>,
    notes: Option<String>,
    admin_notes: Option<String>,
    cancelled_by: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    customer_user_id: Option<uuid::Uuid>,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    shipping_address: serde_json::Value,
    payment_method: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl<'r> FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            order_number: row.try_get("order_number")?,
            status: row.try_get("status")?,
            is_paid: row.try_get("is_paid")?,
            items: row.try_get("items")?,
            subtotal: row.try_get("subtotal")?,
            shipping_cost: row.try_get("shipping_cost")?,
            tax: row.try_get("tax")?,
            total: row.try_get("total")?,
            tracking_number: row.try_get("tracking_number")?,
            notes: row.try_get("notes")?,
            admin_notes: row.try_get("admin_notes")?,
            cancelled_by: row.try_get("cancelled_by")?,
            cancelled_at: row.try_get("cancelled_at")?,
            cancellation_reason: row.try_get("cancellation_reason")?,
            customer_user_id: row.try_get("customer_user_id")?,
            customer_name: row.try_get("customer_name")?,
            customer_email: row.try_get("customer_email")?,
            customer_phone: row.try_get("customer_phone")?,
            shipping_address: row.try_get("shipping_address")?,
            payment_method: row.try_get("payment_method")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
        })
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str, detail: String| StoreError::Corrupt(format!("order {}: {what}: {detail}", row.id));

        let status: OrderStatus = row
            .status
            .parse()
            .map_err(|e: shopdesk_core::DomainError| corrupt("status", e.to_string()))?;
        let items: Vec<LineItem> =
            serde_json::from_value(row.items.clone()).map_err(|e| corrupt("items", e.to_string()))?;
        let shipping_address: ShippingAddress = serde_json::from_value(row.shipping_address.clone())
            .map_err(|e| corrupt("shipping_address", e.to_string()))?;

        let cancellation = match (row.cancelled_by.as_deref(), row.cancelled_at) {
            (Some(actor), Some(cancelled_at)) => Some(CancellationRecord {
                cancelled_by: CancellationActor::parse(actor)
                    .ok_or_else(|| corrupt("cancelled_by", actor.to_string()))?,
                cancelled_at,
                reason: row.cancellation_reason.clone(),
            }),
            (None, None) => None,
            _ => return Err(corrupt("cancellation", "partial cancellation record".to_string())),
        };

        let version = u64::try_from(row.version).map_err(|_| corrupt("version", row.version.to_string()))?;

        Ok(Order::from_parts(OrderParts {
            id: OrderId::from_uuid(row.id),
            order_number: row.order_number,
            status,
            is_paid: row.is_paid,
            items,
            subtotal: from_db_amount("subtotal", row.subtotal)?,
            shipping_cost: from_db_amount("shipping_cost", row.shipping_cost)?,
            tax: from_db_amount("tax", row.tax)?,
            total: from_db_amount("total", row.total)?,
            tracking_number: row.tracking_number,
            notes: row.notes,
            admin_notes: row.admin_notes,
            cancellation,
            customer: CustomerSnapshot {
                user_id: row.customer_user_id.map(UserId::from_uuid),
                name: row.customer_name,
                email: row.customer_email,
                phone: row.customer_phone,
            },
            shipping_address,
            payment_method: row.payment_method,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version,
        }))
    }
}

fn decode_order(row: &PgRow) -> Result<Order, StoreError> {
    let row = OrderRow::from_row(row).map_err(|e| StoreError::Corrupt(format!("failed to decode order row: {e}")))?;
    Order::try_from(row)
}
