use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Extension, Router,
};
use serde_json::json;

use super::{authenticated, list_owned, only, require_fields, restricted, JsonBody, Owned};
use crate::auth::STAFF;
use crate::error::{ApiError, ApiResult};
use crate::models::account::SubscriptionStatus;
use crate::models::{build, Principal, Subscription};
use crate::response::Reply;
use crate::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let own = authenticated(
        state,
        Router::new()
            .route("/", get(list_subscriptions).post(create_subscription))
            .route("/current", get(current_subscription))
            .route("/{id}/cancel", patch(cancel_subscription)),
    );
    let staff = restricted(
        state,
        STAFF,
        Router::new()
            .route("/admin/all", get(list_all))
            .route("/admin/{id}/cancel", patch(cancel_any)),
    );
    own.merge(staff)
}

fn newest_first(subscriptions: &mut [Subscription]) {
    subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

async fn current_subscription(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
) -> ApiResult<Reply> {
    let mut active: Vec<Subscription> = state.store.find(|s: &Subscription| {
        s.owner() == me.id && s.status == SubscriptionStatus::Active
    })?;
    newest_first(&mut active);
    match active.into_iter().next() {
        Some(subscription) => Ok(Reply::ok("Current subscription retrieved successfully")
            .data(json!({ "subscription": subscription }))),
        None => Ok(Reply::ok("No active subscription").data(json!({ "subscription": null }))),
    }
}

async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
) -> ApiResult<Reply> {
    let mut subscriptions = list_owned::<Subscription>(&state, &me.id)?;
    newest_first(&mut subscriptions);
    Ok(Reply::ok("Subscriptions retrieved successfully")
        .data(json!({ "subscriptions": subscriptions })))
}

async fn create_subscription(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    require_fields(
        &body,
        &["planName", "price", "billingCycle"],
        "Plan name, price, and billing cycle are required",
    )?;
    let now = state.now();
    let body = only(&body, &["planName", "price", "billingCycle"]);
    let mut subscription: Subscription = build(
        body,
        now,
        &[
            ("userId", json!(me.id)),
            ("status", json!(SubscriptionStatus::Active)),
            ("startDate", json!(now)),
            ("nextBillingDate", json!(now)),
        ],
    )?;
    subscription.next_billing_date = subscription.billing_cycle.next_billing(now);

    let replaced = state.store.write(|txn| {
        let replaced = txn.update_where(
            |s: &Subscription| s.owner() == me.id && s.status == SubscriptionStatus::Active,
            |s| s.cancel(now),
        )?;
        txn.put(&subscription)?;
        Ok(replaced)
    })?;

    tracing::info!(
        user_id = %me.id,
        plan = %subscription.plan_name,
        replaced,
        "subscription started"
    );
    Ok(Reply::created("Subscription created successfully")
        .data(json!({ "subscription": subscription })))
}

async fn cancel_subscription(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    const MISSING: &str = "Active subscription not found";
    let now = state.now();
    let subscription = state
        .store
        .update::<Subscription>(&id, |s| {
            if s.owner() != me.id || s.status != SubscriptionStatus::Active {
                return Err(ApiError::not_found(MISSING).into());
            }
            s.cancel(now);
            Ok(())
        })?
        .ok_or_else(|| ApiError::not_found(MISSING))?;
    Ok(Reply::ok("Subscription cancelled successfully")
        .data(json!({ "subscription": subscription })))
}

async fn list_all(State(state): State<AppState>) -> ApiResult<Reply> {
    let mut subscriptions = state.store.list::<Subscription>()?;
    newest_first(&mut subscriptions);
    Ok(Reply::ok("All subscriptions retrieved successfully")
        .data(json!({ "subscriptions": subscriptions })))
}

async fn cancel_any(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    let now = state.now();
    let subscription = state
        .store
        .update::<Subscription>(&id, |s| {
            s.cancel(now);
            Ok(())
        })?
        .ok_or_else(|| ApiError::not_found("Subscription not found"))?;
    tracing::info!(by = %me.id, subscription_id = %subscription.id, "subscription cancelled by staff");
    Ok(Reply::ok("Subscription cancelled successfully")
        .data(json!({ "subscription": subscription })))
}
