use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use shopdesk_auth::AuthzError;
use shopdesk_core::OrderId;
use shopdesk_infra::EngineError;

/// HTTP status for a machine-readable error code.
pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "TerminalState" | "OrderCancelledCannotModify" | "OrderCancelledImmutable" | "NotCancellableByCustomer" => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        "OrderNotFound" => StatusCode::NOT_FOUND,
        "ValidationError" => StatusCode::BAD_REQUEST,
        "StoreUnavailable" => StatusCode::SERVICE_UNAVAILABLE,
        "Conflict" => StatusCode::CONFLICT,
        "Forbidden" => StatusCode::FORBIDDEN,
        "Unauthorized" => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    let code = err.code();
    json_error(status_for_code(code), code, err.to_string())
}

pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "Forbidden", err.to_string())
}

pub fn validation_error(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "ValidationError", message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_order_id(s: &str) -> Result<OrderId, axum::response::Response> {
    s.parse::<OrderId>()
        .map_err(|_| validation_error(format!("'{s}' is not a valid order id")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopdesk_orders::OrderError;

    #[test]
    fn business_denials_map_to_unprocessable() {
        for err in [
            OrderError::OrderCancelledCannotModify,
            OrderError::OrderCancelledImmutable,
            OrderError::NotCancellableByCustomer(shopdesk_orders::OrderStatus::Shipped),
        ] {
            let response = engine_error_to_response(EngineError::Order(err));
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn infrastructure_errors_keep_their_status() {
        assert_eq!(
            engine_error_to_response(EngineError::NotFound(OrderId::new())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            engine_error_to_response(EngineError::StoreUnavailable("down".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            engine_error_to_response(EngineError::Conflict("busy".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            engine_error_to_response(EngineError::InternalConsistency("dup".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn malformed_ids_are_validation_errors() {
        let response = parse_order_id("not-a-uuid").unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
