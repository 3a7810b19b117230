pub mod auth;
pub mod content;
pub mod dashboard;
pub mod orders;
pub mod payments;
pub mod projects;
pub mod reports;
pub mod site;
pub mod subscriptions;
pub mod support;
pub mod team;
pub mod users;

use axum::{
    extract::{FromRequest, Request, State},
    middleware, Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Map, Value};

use crate::auth::{require_auth, require_roles, AllowedRoles};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Activity, Order, PaymentMethod, Project, Report, Role, Subscription, SupportTicket, TeamMember,
};
use crate::store::{document::check_id, Document, StoreError};
use crate::AppState;

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Server is running",
        "timestamp": state.now(),
    }))
}

// ── Route guards ─────────────────────────────────────────────────────────────

/// Every route in `router` requires a valid access token and an admitted
/// account.
pub(crate) fn authenticated(state: &AppState, router: Router<AppState>) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}

/// Like [`authenticated`], plus a role check. The auth layer is added last so
/// it runs first.
pub(crate) fn restricted(
    state: &AppState,
    roles: &'static [Role],
    router: Router<AppState>,
) -> Router<AppState> {
    router
        .route_layer(middleware::from_fn_with_state(
            AllowedRoles(roles),
            require_roles,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}

// ── Request bodies ───────────────────────────────────────────────────────────

/// A JSON body whose rejection is rendered in the standard error envelope.
pub struct JsonBody(pub Value);

impl<S: Send + Sync> FromRequest<S> for JsonBody {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<Value>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::invalid_fields(rejection.body_text())),
        }
    }
}

/// A non-blank string field.
pub(crate) fn text<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Whether `key` carries a usable value: present, not null, not `""`.
pub(crate) fn present(body: &Value, key: &str) -> bool {
    match body.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

pub(crate) fn require_fields(body: &Value, keys: &[&str], message: &str) -> ApiResult<()> {
    if keys.iter().all(|key| present(body, key)) {
        Ok(())
    } else {
        Err(ApiError::validation(message))
    }
}

/// Decode a query-string or body value into a typed enum.
pub(crate) fn parse_as<T: DeserializeOwned>(raw: &str, field: &str) -> ApiResult<T> {
    serde_json::from_value(Value::String(raw.to_owned()))
        .map_err(|_| ApiError::validation(format!("Invalid {field}: {raw}")))
}

/// Keep only `allowed` keys of a JSON object body.
pub(crate) fn only(body: &Value, allowed: &[&str]) -> Value {
    let map: Map<String, Value> = body
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(k, _)| allowed.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    Value::Object(map)
}

// ── Response data ────────────────────────────────────────────────────────────

pub(crate) fn to_json<T: Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(e.into()))
}

/// `{key: value}`.
pub(crate) fn keyed<T: Serialize>(key: &str, value: &T) -> ApiResult<Value> {
    let mut map = Map::new();
    map.insert(key.to_owned(), to_json(value)?);
    Ok(Value::Object(map))
}

// ── Owner-scoped documents ───────────────────────────────────────────────────

/// Documents that belong to one user. Lookups by another user behave as if
/// the document did not exist.
pub trait Owned: Document {
    fn owner(&self) -> &str;
}

macro_rules! owned_by_user_id {
    ($($ty:ty),* $(,)?) => {
        $(impl Owned for $ty {
            fn owner(&self) -> &str {
                &self.user_id
            }
        })*
    };
}

owned_by_user_id!(
    Activity,
    Order,
    PaymentMethod,
    Project,
    Report,
    Subscription,
    SupportTicket,
    TeamMember,
);

pub(crate) fn list_owned<D: Owned>(state: &AppState, owner: &str) -> ApiResult<Vec<D>> {
    Ok(state.store.find(|d: &D| d.owner() == owner)?)
}

pub(crate) fn find_owned<D: Owned>(
    state: &AppState,
    id: &str,
    owner: &str,
    missing: &str,
) -> ApiResult<D> {
    match state.store.get::<D>(id)? {
        Some(doc) if doc.owner() == owner => Ok(doc),
        _ => Err(ApiError::not_found(missing)),
    }
}

/// Read-modify-write of an owned document in one transaction.
pub(crate) fn update_owned<D: Owned>(
    state: &AppState,
    id: &str,
    owner: &str,
    missing: &str,
    f: impl FnOnce(&mut D) -> ApiResult<()>,
) -> ApiResult<D> {
    let updated = state.store.update::<D>(id, |doc| {
        if doc.owner() != owner {
            return Err(ApiError::not_found(missing).into());
        }
        f(doc)?;
        Ok(())
    })?;
    updated.ok_or_else(|| ApiError::not_found(missing))
}

/// Owner check and removal share one write transaction.
pub(crate) fn delete_owned<D: Owned>(
    state: &AppState,
    id: &str,
    owner: &str,
    missing: &str,
) -> ApiResult<D> {
    check_id(id)?;
    let removed = state.store.write(|txn| match txn.get::<D>(id)? {
        Some(doc) if doc.owner() == owner => txn.remove::<D>(id),
        _ => Ok(None),
    })?;
    removed.ok_or_else(|| ApiError::not_found(missing))
}

/// Retry `attempt` with fresh random numbers while it collides on a unique
/// key.
pub(crate) fn allocate<T>(mut attempt: impl FnMut() -> anyhow::Result<T>) -> ApiResult<T> {
    const ATTEMPTS: usize = 16;
    let mut last = None;
    for _ in 0..ATTEMPTS {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(e) if StoreError::is_duplicate(&e) => last = Some(e),
            Err(e) => return Err(e.into()),
        }
    }
    Err(ApiError::Internal(
        last.unwrap_or_else(|| anyhow::anyhow!("number allocation failed")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_rules() {
        let body = json!({"a": "x", "b": "  ", "c": null, "d": 0, "e": false});
        assert!(present(&body, "a"));
        assert!(!present(&body, "b"));
        assert!(!present(&body, "c"));
        assert!(present(&body, "d"));
        assert!(present(&body, "e"));
        assert!(!present(&body, "z"));
        assert_eq!(text(&body, "a"), Some("x"));
        assert_eq!(text(&body, "b"), None);
    }

    #[test]
    fn only_keeps_allowed_keys() {
        let body = json!({"status": "Ready", "name": "x", "fileUrl": "u"});
        assert_eq!(
            only(&body, &["status", "fileUrl"]),
            json!({"status": "Ready", "fileUrl": "u"})
        );
        assert_eq!(only(&json!([1]), &["a"]), json!({}));
    }

    #[test]
    fn allocate_retries_duplicates_only() {
        let mut calls = 0;
        let value = allocate(|| {
            calls += 1;
            if calls < 3 {
                Err(StoreError::Duplicate { field: "n".into() }.into())
            } else {
                Ok(calls)
            }
        })
        .unwrap();
        assert_eq!(value, 3);

        let err = allocate::<()>(|| anyhow::bail!("disk")).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    fn state() -> (AppState, tempfile::TempDir) {
        use crate::auth::TokenService;
        use crate::clock::{ManualClock, SharedClock};
        use std::sync::Arc;
        use std::time::Duration;

        let (store, dir) = crate::store::db::tests::make_store();
        let clock: SharedClock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let day = Duration::from_secs(86_400);
        let tokens = TokenService::new(Some("a"), Some("r"), day, day, clock.clone());
        let state = AppState {
            store,
            tokens: Arc::new(tokens),
            clock,
            environment: crate::Environment::Test,
        };
        (state, dir)
    }

    #[test]
    fn delete_owned_checks_the_owner_in_the_write() {
        use crate::models::{build, Project};
        use axum::http::StatusCode;

        let (state, _dir) = state();
        let project: Project = build(
            json!({
                "name": "p",
                "domain": "x.com",
                "targetLinks": 5,
                "startDate": "2025-01-01",
                "lastActivity": "2025-01-01",
            }),
            state.now(),
            &[("userId", json!("alice"))],
        )
        .unwrap();
        state.store.insert(&project).unwrap();

        let err = delete_owned::<Project>(&state, &project.id, "bob", "Project not found").unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(state.store.get::<Project>(&project.id).unwrap().is_some());

        let err = delete_owned::<Project>(&state, "not-an-id", "alice", "Project not found").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let removed = delete_owned::<Project>(&state, &project.id, "alice", "Project not found").unwrap();
        assert_eq!(removed.id, project.id);
        assert!(state.store.get::<Project>(&project.id).unwrap().is_none());

        let err = delete_owned::<Project>(&state, &project.id, "alice", "Project not found").unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
