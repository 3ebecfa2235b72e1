//! `/orders` endpoints for the admin dashboard, fulfillment integrations and
//! the storefront's self-service cancel.
//!
//! Every handler authorizes before it parses, so a caller without the
//! permission gets 403 whatever the request looks like.
//!
//! Accepted mutations run detached from the request, so a client that hangs
//! up mid-request never leaves an order half-updated.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};

use shopdesk_auth::Permission;
use shopdesk_core::OrderId;
use shopdesk_infra::{BulkStatusRequest as EngineBulkRequest, lifecycle::run_detached};

use crate::app::dto::{
    AdminNotesRequest, BulkFailureView, BulkStatusRequest, BulkStatusResponse, CustomerCancelRequest,
    ListOrdersQuery, OrderView, UpdatePaymentRequest, UpdateStatusRequest,
};
use crate::app::errors::{engine_error_to_response, parse_order_id};
use crate::app::routes::common::{CmdAuth, json_body};
use crate::app::services::AppServices;
use crate::authz::cancellation_actor;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders))
        .route("/bulk/status", put(bulk_update_status))
        .route("/:id", get(get_order).delete(delete_order))
        .route("/:id/status", put(update_status))
        .route("/:id/payment", put(update_payment))
        .route("/:id/admin-notes", put(update_admin_notes))
        .route("/:id/cancel", post(customer_cancel))
}

async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Response, Response> {
    let query = CmdAuth::new(query, Permission::ORDERS_READ).authorized(&principal)?;
    let filter = query.to_filter()?;
    let sort = query.to_sort()?;

    let orders = services
        .engine
        .projector()
        .list(&filter, sort)
        .await
        .map_err(engine_error_to_response)?;

    let views: Vec<OrderView> = orders.iter().map(OrderView::from).collect();
    Ok(Json(serde_json::json!({
        "count": views.len(),
        "orders": views,
    }))
    .into_response())
}

async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    let id = CmdAuth::new(id, Permission::ORDERS_READ).authorized(&principal)?;
    let id = parse_order_id(&id)?;

    let order = services
        .engine
        .lifecycle()
        .get(id)
        .await
        .map_err(engine_error_to_response)?;
    Ok(Json(OrderView::from(&order)).into_response())
}

async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let (id, body) = CmdAuth::new((id, body), Permission::ORDERS_STATUS_UPDATE).authorized(&principal)?;
    let id = parse_order_id(&id)?;
    let change = json_body(body)?.to_change()?;
    let actor = cancellation_actor(&principal);

    let lifecycle = services.engine.lifecycle().clone();
    let order = run_detached("status", async move { lifecycle.transition(id, &change, actor).await })
        .await
        .map_err(engine_error_to_response)?;
    Ok(Json(OrderView::from(&order)).into_response())
}

async fn bulk_update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<BulkStatusRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let body = CmdAuth::new(body, Permission::ORDERS_STATUS_UPDATE).authorized(&principal)?;
    let body = json_body(body)?;
    let change = body.to_change()?;

    let mut order_ids: Vec<OrderId> = Vec::with_capacity(body.order_ids.len());
    let mut malformed = Vec::new();
    for raw in &body.order_ids {
        match raw.parse::<OrderId>() {
            Ok(id) => order_ids.push(id),
            Err(e) => malformed.push(BulkFailureView {
                order_id: raw.clone(),
                error: "ValidationError",
                message: e.to_string(),
            }),
        }
    }

    let outcome = if order_ids.is_empty() && !malformed.is_empty() {
        Default::default()
    } else {
        services
            .engine
            .bulk()
            .apply_bulk(EngineBulkRequest {
                order_ids,
                change,
                actor: cancellation_actor(&principal),
            })
            .await
            .map_err(engine_error_to_response)?
    };

    Ok(Json(BulkStatusResponse::new(outcome, malformed)).into_response())
}

async fn update_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<UpdatePaymentRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let (id, body) = CmdAuth::new((id, body), Permission::ORDERS_PAYMENT_UPDATE).authorized(&principal)?;
    let id = parse_order_id(&id)?;
    let is_paid = json_body(body)?.is_paid;

    let payment = services.engine.payment().clone();
    let order = run_detached("payment", async move { payment.set_paid(id, is_paid).await })
        .await
        .map_err(engine_error_to_response)?;
    Ok(Json(OrderView::from(&order)).into_response())
}

async fn update_admin_notes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<AdminNotesRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let (id, body) = CmdAuth::new((id, body), Permission::ORDERS_ADMIN_NOTES).authorized(&principal)?;
    let id = parse_order_id(&id)?;
    let notes = json_body(body)?.admin_notes;

    let audit = services.engine.audit().clone();
    let order = run_detached("admin_notes", async move { audit.set_admin_notes(id, notes).await })
        .await
        .map_err(engine_error_to_response)?;
    Ok(Json(OrderView::from(&order)).into_response())
}

async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    let id = CmdAuth::new(id, Permission::ORDERS_DELETE).authorized(&principal)?;
    let id = parse_order_id(&id)?;

    let lifecycle = services.engine.lifecycle().clone();
    run_detached("delete", async move { lifecycle.delete(id).await })
        .await
        .map_err(engine_error_to_response)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Storefront self-service cancel. Only the owning customer, and only while
/// the order is pending or processing.
async fn customer_cancel(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<CustomerCancelRequest>>,
) -> Result<Response, Response> {
    let id = CmdAuth::new(id, Permission::ORDERS_CANCEL_OWN).authorized(&principal)?;
    let id = parse_order_id(&id)?;
    let reason = body
        .and_then(|Json(req)| req.reason)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let customer = principal.user_id();

    let lifecycle = services.engine.lifecycle().clone();
    let order = run_detached("customer_cancel", async move {
        lifecycle.customer_cancel(id, customer, reason).await
    })
    .await
    .map_err(engine_error_to_response)?;
    Ok(Json(OrderView::from(&order)).into_response())
}
