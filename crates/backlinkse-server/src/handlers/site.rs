//! Routers for the site-wide singletons: settings, theme, navigation and live
//! chat. Readers always get the active document; admins manage the rest.

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Router,
};
use serde_json::json;

use super::{authenticated, keyed, restricted, JsonBody};
use crate::auth::{ADMIN, STAFF};
use crate::error::{ApiError, ApiResult};
use crate::models::site::SiteConfig;
use crate::models::{build, default_field, merge};
use crate::response::Reply;
use crate::seed::ensure_site;
use crate::AppState;

pub fn routes<S: SiteConfig>(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/", get(active::<S>));
    let signed_in = authenticated(state, Router::new().route("/", patch(update_active::<S>)));
    let staff = restricted(
        state,
        STAFF,
        Router::new()
            .route("/admin/all", get(list_all::<S>))
            .route("/admin/{id}", get(get_one::<S>)),
    );
    let admin = restricted(
        state,
        ADMIN,
        Router::new()
            .route("/admin", post(create::<S>))
            .route("/admin/{id}", patch(update::<S>).delete(remove::<S>)),
    );
    public.merge(signed_in).merge(staff).merge(admin)
}

fn not_found<S: SiteConfig>() -> ApiError {
    ApiError::not_found(format!("{} not found", S::LABEL))
}

async fn active<S: SiteConfig>(State(state): State<AppState>) -> ApiResult<Reply> {
    let doc = ensure_site::<S>(&state.store, state.now())?;
    Ok(Reply::ok(format!("Active {} retrieved successfully", S::NOUN)).data(keyed(S::KEY, &doc)?))
}

async fn update_active<S: SiteConfig>(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    let now = state.now();
    let current = ensure_site::<S>(&state.store, now)?;
    let doc = state
        .store
        .update_exclusive::<S>(current.id(), |doc| {
            *doc = merge(&*doc, &body, now, &["isActive"])?;
            Ok(())
        })?
        .ok_or_else(not_found::<S>)?;
    Ok(Reply::ok(format!("Active {} updated successfully", S::NOUN)).data(keyed(S::KEY, &doc)?))
}

async fn list_all<S: SiteConfig>(State(state): State<AppState>) -> ApiResult<Reply> {
    let mut docs = state.store.list::<S>()?;
    docs.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    Ok(Reply::ok(format!("All {} retrieved successfully", S::NOUNS)).data(keyed(S::KEYS, &docs)?))
}

async fn get_one<S: SiteConfig>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    let doc = state.store.get::<S>(&id)?.ok_or_else(not_found::<S>)?;
    Ok(Reply::ok(format!("{} retrieved successfully", S::LABEL)).data(keyed(S::KEY, &doc)?))
}

async fn create<S: SiteConfig>(
    State(state): State<AppState>,
    JsonBody(mut body): JsonBody,
) -> ApiResult<Reply> {
    default_field(&mut body, "isActive", json!(false));
    let doc: S = build(body, state.now(), &[])?;
    state.store.insert_exclusive(&doc)?;
    tracing::info!(collection = S::COLLECTION, id = doc.id(), active = doc.is_selected(), "site config created");
    Ok(Reply::created(format!("{} created successfully", S::LABEL)).data(keyed(S::KEY, &doc)?))
}

async fn update<S: SiteConfig>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    let now = state.now();
    let doc = state
        .store
        .update_exclusive::<S>(&id, |doc| {
            *doc = merge(&*doc, &body, now, &[])?;
            Ok(())
        })?
        .ok_or_else(not_found::<S>)?;
    Ok(Reply::ok(format!("{} updated successfully", S::LABEL)).data(keyed(S::KEY, &doc)?))
}

async fn remove<S: SiteConfig>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    let doc = state.store.delete::<S>(&id)?.ok_or_else(not_found::<S>)?;
    tracing::info!(collection = S::COLLECTION, id = %id, "site config deleted");
    Ok(Reply::ok(format!("{} deleted successfully", S::LABEL)).data(keyed(S::KEY, &doc)?))
}
