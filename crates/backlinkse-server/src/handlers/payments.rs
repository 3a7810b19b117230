use axum::{
    extract::{Path, State},
    routing::{delete, get, patch},
    Extension, Router,
};
use chrono::Datelike;
use serde_json::json;

use super::{authenticated, delete_owned, list_owned, only, require_fields, JsonBody, Owned};
use crate::error::{ApiError, ApiResult};
use crate::models::{build, PaymentMethod, Principal};
use crate::response::Reply;
use crate::AppState;

const MISSING: &str = "Payment method not found";

pub fn routes(state: &AppState) -> Router<AppState> {
    authenticated(
        state,
        Router::new()
            .route("/", get(list_methods).post(add_method))
            .route("/{id}", delete(delete_method))
            .route("/{id}/default", patch(set_default)),
    )
}

/// Default first, then newest.
fn order_methods(methods: &mut [PaymentMethod]) {
    methods.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

async fn list_methods(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
) -> ApiResult<Reply> {
    let mut methods = list_owned::<PaymentMethod>(&state, &me.id)?;
    order_methods(&mut methods);
    Ok(Reply::ok("Payment methods retrieved successfully")
        .data(json!({ "paymentMethods": methods })))
}

async fn add_method(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    require_fields(
        &body,
        &["type", "last4", "expiryMonth", "expiryYear"],
        "Type, last4, expiryMonth, and expiryYear are required",
    )?;
    let now = state.now();
    let body = only(
        &body,
        &["type", "last4", "expiryMonth", "expiryYear", "isDefault"],
    );
    let mut method: PaymentMethod = build(body, now, &[("userId", json!(me.id))])?;
    if method.is_expired_by(now.year()) {
        return Err(ApiError::validation("Expiry year cannot be in the past"));
    }

    let method = state.store.write(|txn| {
        let first = !txn
            .all::<PaymentMethod>()?
            .iter()
            .any(|m| m.owner() == me.id);
        if first {
            method.is_default = true;
        }
        txn.put_exclusive(&method)?;
        Ok(method)
    })?;

    tracing::info!(user_id = %me.id, method_id = %method.id, default = method.is_default, "payment method added");
    Ok(Reply::created("Payment method added successfully")
        .data(json!({ "paymentMethod": method })))
}

async fn set_default(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    let now = state.now();
    let method = state
        .store
        .update_exclusive::<PaymentMethod>(&id, |method| {
            if method.owner() != me.id {
                return Err(ApiError::not_found(MISSING).into());
            }
            method.is_default = true;
            method.updated_at = now;
            Ok(())
        })?
        .ok_or_else(|| ApiError::not_found(MISSING))?;
    Ok(Reply::ok("Default payment method updated successfully")
        .data(json!({ "paymentMethod": method })))
}

async fn delete_method(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    delete_owned::<PaymentMethod>(&state, &id, &me.id, MISSING)?;
    Ok(Reply::ok("Payment method deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn card(last4: &str, is_default: bool, age_days: i64) -> PaymentMethod {
        build(
            json!({
                "type": "Visa",
                "last4": last4,
                "expiryMonth": 12,
                "expiryYear": 2099,
                "isDefault": is_default,
            }),
            Utc::now() - Duration::days(age_days),
            &[("userId", json!("u"))],
        )
        .unwrap()
    }

    #[test]
    fn default_sorts_first_then_newest() {
        let mut methods = vec![card("1111", false, 3), card("2222", true, 9), card("3333", false, 1)];
        order_methods(&mut methods);
        let order: Vec<&str> = methods.iter().map(|m| m.last4.as_str()).collect();
        assert_eq!(order, ["2222", "3333", "1111"]);
    }

    #[test]
    fn last4_must_be_digits() {
        let err = build::<PaymentMethod>(
            json!({"type": "Visa", "last4": "12a4", "expiryMonth": 1, "expiryYear": 2099}),
            Utc::now(),
            &[("userId", json!("u"))],
        )
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
