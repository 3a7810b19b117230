use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Router,
};
use serde_json::{json, Value};
use tracing::info;

use super::auth::{check_password_length, email_taken, hash_password, raw_password};
use super::{present, restricted, text, JsonBody};
use crate::auth::{ADMIN, STAFF};
use crate::error::{ApiError, ApiResult};
use crate::models::{Principal, Role, User, Validate};
use crate::response::Reply;
use crate::store::{is_valid_id, new_id};
use crate::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let staff = restricted(
        state,
        STAFF,
        Router::new()
            .route("/", get(list_users))
            .route("/{id}", get(get_user))
            .route("/{id}/verify", patch(approve_user))
            .route("/{id}/suspend", patch(suspend_user))
            .route("/{id}/unsuspend", patch(unsuspend_user)),
    );
    let admin = restricted(
        state,
        ADMIN,
        Router::new()
            .route("/", axum::routing::post(create_user))
            .route("/{id}", patch(update_user).delete(delete_user)),
    );
    staff.merge(admin)
}

fn not_found(id: &str) -> ApiError {
    ApiError::not_found(format!("User with ID {id} not found"))
}

/// A malformed id names no user.
fn known(id: &str) -> ApiResult<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(not_found(id))
    }
}

fn flag(body: &Value, key: &str) -> Option<bool> {
    body.get(key).and_then(Value::as_bool)
}

fn role(body: &Value) -> ApiResult<Option<Role>> {
    match text(body, "role") {
        Some(raw) => Ok(Some(super::parse_as(raw, "role")?)),
        None => Ok(None),
    }
}

/// Apply a staff change to one user and answer with its projection.
fn change(
    state: &AppState,
    id: &str,
    message: &str,
    f: impl FnOnce(&mut User),
) -> ApiResult<Reply> {
    known(id)?;
    let now = state.now();
    let user = state
        .store
        .update_user(id, |user| {
            f(user);
            user.updated_at = now;
            Ok(())
        })?
        .ok_or_else(|| not_found(id))?;
    Ok(Reply::ok(message).data(json!({ "user": Principal::from(&user) })))
}

async fn list_users(State(state): State<AppState>) -> ApiResult<Reply> {
    let mut users = state.store.list::<User>()?;
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let users: Vec<Principal> = users.iter().map(Principal::from).collect();
    Ok(Reply::ok("Users retrieved successfully").data(json!({
        "count": users.len(),
        "users": users,
    })))
}

async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Reply> {
    known(&id)?;
    let user = state.store.get::<User>(&id)?.ok_or_else(|| not_found(&id))?;
    Ok(Reply::ok("User retrieved successfully").data(json!({ "user": Principal::from(&user) })))
}

async fn create_user(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Reply> {
    let (Some(name), Some(email), Some(plain)) = (
        text(&body, "name"),
        text(&body, "email"),
        raw_password(&body, "password"),
    ) else {
        return Err(ApiError::validation("Name, email, and password are required"));
    };
    check_password_length(plain)?;

    let now = state.now();
    let mut user = User {
        id: new_id(),
        name: name.to_owned(),
        email: email.to_owned(),
        password_hash: String::new(),
        role: role(&body)?.unwrap_or_default(),
        // An admin creating the account is the approval.
        is_verified: flag(&body, "isVerified").unwrap_or(true),
        is_suspended: flag(&body, "isSuspended").unwrap_or(false),
        is_active: flag(&body, "isActive").unwrap_or(true),
        is_deleted: flag(&body, "isDeleted").unwrap_or(false),
        created_at: now,
        updated_at: now,
    };
    user.validate()?;
    user.password_hash = hash_password(plain).await?;
    state.store.create_user(&mut user).map_err(email_taken)?;

    info!(user_id = %user.id, role = %user.role, "user created by admin");
    Ok(Reply::created("User created successfully")
        .data(json!({ "user": Principal::from(&user) })))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    if present(&body, "password") {
        return Err(ApiError::validation(
            "Password cannot be updated through this endpoint",
        ));
    }
    known(&id)?;
    let role = role(&body)?;
    let now = state.now();
    let user = state
        .store
        .update_user(&id, |user| {
            if let Some(name) = text(&body, "name") {
                user.name = name.to_owned();
            }
            if let Some(email) = text(&body, "email") {
                user.email = email.to_owned();
            }
            if let Some(role) = role {
                user.role = role;
            }
            if let Some(v) = flag(&body, "isVerified") {
                user.is_verified = v;
            }
            if let Some(v) = flag(&body, "isSuspended") {
                user.is_suspended = v;
            }
            if let Some(v) = flag(&body, "isActive") {
                user.is_active = v;
            }
            if let Some(v) = flag(&body, "isDeleted") {
                user.is_deleted = v;
            }
            user.validate()?;
            user.updated_at = now;
            Ok(())
        })
        .map_err(email_taken)?
        .ok_or_else(|| not_found(&id))?;

    info!(user_id = %id, "user updated");
    Ok(Reply::ok("User updated successfully").data(json!({ "user": Principal::from(&user) })))
}

/// Soft delete: the record stays, the account can no longer sign in.
async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Reply> {
    known(&id)?;
    let now = state.now();
    state
        .store
        .update_user(&id, |user| {
            user.is_deleted = true;
            user.is_active = false;
            user.updated_at = now;
            Ok(())
        })?
        .ok_or_else(|| not_found(&id))?;
    info!(user_id = %id, "user deleted");
    Ok(Reply::ok("User deleted successfully"))
}

async fn approve_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Reply> {
    let reply = change(&state, &id, "User approved successfully", |user| {
        user.is_verified = true;
        user.is_suspended = false;
        user.is_active = true;
        user.is_deleted = false;
    })?;
    info!(user_id = %id, "user approved");
    Ok(reply)
}

async fn suspend_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Reply> {
    let reply = change(&state, &id, "User suspended successfully", |user| {
        user.is_suspended = true;
    })?;
    info!(user_id = %id, "user suspended");
    Ok(reply)
}

async fn unsuspend_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Reply> {
    let reply = change(&state, &id, "User unsuspended successfully", |user| {
        user.is_suspended = false;
    })?;
    info!(user_id = %id, "user unsuspended");
    Ok(reply)
}
