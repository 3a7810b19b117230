use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Router,
};
use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use serde_json::json;

use super::{
    allocate, authenticated, find_owned, list_owned, only, parse_as, present, require_fields,
    text, update_owned, JsonBody,
};
use crate::error::ApiResult;
use crate::models::work::{OrderStatus, PackageType};
use crate::models::{build, default_field, merge, Activity, Order, Principal};
use crate::response::Reply;
use crate::AppState;

const MISSING: &str = "Order not found";

pub fn routes(state: &AppState) -> Router<AppState> {
    authenticated(
        state,
        Router::new()
            .route("/", get(list_orders).post(create_order))
            .route("/{id}", get(get_order).patch(update_order)),
    )
}

/// `ORD-<year>-<3 digits>`. Uniqueness is enforced on insert.
fn order_number(now: DateTime<Utc>) -> String {
    let n: u16 = rand::thread_rng().gen_range(0..1000);
    format!("ORD-{}-{n:03}", now.year())
}

async fn list_orders(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Reply> {
    let status: Option<OrderStatus> = params
        .get("status")
        .map(|raw| parse_as(raw, "status"))
        .transpose()?;
    let package_type: Option<PackageType> = params
        .get("packageType")
        .map(|raw| parse_as(raw, "packageType"))
        .transpose()?;

    let mut orders: Vec<Order> = list_owned::<Order>(&state, &me.id)?
        .into_iter()
        .filter(|o| status.map_or(true, |s| o.status == s))
        .filter(|o| package_type.map_or(true, |t| o.package_type == t))
        .collect();
    orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
    Ok(Reply::ok("Orders retrieved successfully").data(json!({ "orders": orders })))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    let order = find_owned::<Order>(&state, &id, &me.id, MISSING)?;
    Ok(Reply::ok("Order retrieved successfully").data(json!({ "order": order })))
}

async fn create_order(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    require_fields(
        &body,
        &["packageName", "packageType", "linksTotal", "amount"],
        "Package name, type, links total, and amount are required",
    )?;
    let now = state.now();
    let mut body = only(
        &body,
        &["packageName", "packageType", "linksTotal", "amount", "currency", "orderDate"],
    );
    default_field(&mut body, "orderDate", json!(now));

    let mut order: Order = build(
        body,
        now,
        &[
            ("userId", json!(me.id)),
            ("orderNumber", json!(order_number(now))),
            ("status", json!(OrderStatus::Pending)),
        ],
    )?;
    order.currency = order.currency.trim().to_uppercase();
    let activity = Activity::new(&me.id, "New order placed", now)
        .site(order.package_name.clone())
        .order(&order.id);

    let order = allocate(|| {
        order.order_number = order_number(now);
        state.store.write(|txn| {
            txn.put(&order)?;
            txn.put(&activity)
        })?;
        Ok(order.clone())
    })?;

    tracing::info!(order_id = %order.id, number = %order.order_number, "order created");
    Ok(Reply::created("Order created successfully").data(json!({ "order": order })))
}

async fn update_order(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    let now = state.now();
    let patch = only(&body, &["status", "linksDelivered"]);
    let order = update_owned::<Order>(&state, &id, &me.id, MISSING, |order| {
        let mut updated = merge(&*order, &patch, now, &[])?;
        if updated.status == OrderStatus::Completed && order.status != OrderStatus::Completed {
            updated.completed_date = Some(now);
        }
        *order = updated;
        Ok(())
    })?;

    if present(&body, "linksDelivered") {
        let activity = Activity::new(&me.id, "Order updated", now)
            .site(order.package_name.clone())
            .order(&order.id);
        state.store.insert(&activity)?;
    }
    if let Some(status) = text(&body, "status") {
        tracing::info!(order_id = %order.id, status, "order status changed");
    }
    Ok(Reply::ok("Order updated successfully").data(json!({ "order": order })))
}
