//! Generic routers for the seeded marketing collections.
//!
//! Every collection shares one shape: a public, filtered listing, staff-only
//! administration, and messages derived from the collection's nouns.

use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};

use super::{keyed, restricted, JsonBody};
use crate::auth::STAFF;
use crate::error::{ApiError, ApiResult};
use crate::models::content::{lower_noun, sort, Content};
use crate::models::{build, merge};
use crate::response::Reply;
use crate::seed::ensure_content;
use crate::AppState;

/// Public listing, lookup by handle where the collection has one, staff
/// administration under `/admin`.
pub fn routes<C: Content>(state: &AppState) -> Router<AppState> {
    let mut public = Router::new().route("/", get(list_public::<C>));
    if C::HAS_HANDLE {
        public = public.route("/{id}", get(get_public::<C>));
    }
    let staff = restricted(
        state,
        STAFF,
        Router::new()
            .route("/", axum::routing::post(create::<C>))
            .route("/{id}", axum::routing::patch(update::<C>).delete(remove::<C>))
            .route("/admin/all", get(list_all::<C>))
            .route("/admin/{id}", get(get_any::<C>)),
    );
    public.merge(staff)
}

/// Packages list publicly under `/public`; the root listing is staff-only.
pub fn package_routes<C: Content>(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/public", get(list_public::<C>));
    let staff = restricted(
        state,
        STAFF,
        Router::new()
            .route("/", get(list_all::<C>).post(create::<C>))
            .route("/{id}", axum::routing::patch(update::<C>).delete(remove::<C>)),
    );
    public.merge(staff)
}

fn not_found<C: Content>() -> ApiError {
    ApiError::not_found(format!("{} not found", C::SINGULAR))
}

fn seeded<C: Content>(state: &AppState) -> ApiResult<Vec<C>> {
    ensure_content::<C>(&state.store, state.now())?;
    Ok(state.store.list::<C>()?)
}

async fn list_public<C: Content>(State(state): State<AppState>) -> ApiResult<Reply> {
    let mut items: Vec<C> = seeded::<C>(&state)?
        .into_iter()
        .filter(Content::is_public)
        .collect();
    sort(&mut items);
    Ok(Reply::ok(format!("{} retrieved", C::PLURAL)).data(keyed(C::KEYS, &items)?))
}

/// Lookup by handle or id. Hidden records are not found.
async fn get_public<C: Content>(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Reply> {
    ensure_content::<C>(&state.store, state.now())?;
    let item = state
        .store
        .find_one(|c: &C| c.is_public() && (c.id() == key || c.handle() == Some(key.as_str())))?
        .ok_or_else(not_found::<C>)?;
    Ok(Reply::ok(format!("{} retrieved", C::SINGULAR)).data(keyed(C::KEY, &item)?))
}

async fn list_all<C: Content>(State(state): State<AppState>) -> ApiResult<Reply> {
    let mut items = seeded::<C>(&state)?;
    sort(&mut items);
    Ok(Reply::ok(format!("All {} retrieved", lower_noun(C::PLURAL)))
        .data(keyed(C::KEYS, &items)?))
}

async fn get_any<C: Content>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    let item = state.store.get::<C>(&id)?.ok_or_else(not_found::<C>)?;
    Ok(Reply::ok(format!("{} retrieved", C::SINGULAR)).data(keyed(C::KEY, &item)?))
}

async fn create<C: Content>(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    let item: C = build(body, state.now(), &[])?;
    state.store.insert(&item)?;
    tracing::info!(collection = C::COLLECTION, id = item.id(), "content created");
    Ok(Reply::created(format!("{} created", C::SINGULAR)).data(keyed(C::KEY, &item)?))
}

async fn update<C: Content>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    let now = state.now();
    let item = state
        .store
        .update::<C>(&id, |item| {
            *item = merge(&*item, &body, now, &[])?;
            Ok(())
        })?
        .ok_or_else(not_found::<C>)?;
    Ok(Reply::ok(format!("{} updated", C::SINGULAR)).data(keyed(C::KEY, &item)?))
}

async fn remove<C: Content>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    state.store.delete::<C>(&id)?.ok_or_else(not_found::<C>)?;
    tracing::info!(collection = C::COLLECTION, id = %id, "content deleted");
    Ok(Reply::ok(format!("{} deleted", C::SINGULAR)))
}
