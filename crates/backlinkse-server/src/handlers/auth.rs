use axum::{
    extract::State,
    routing::{get, patch, post},
    Extension, Router,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{authenticated, text, JsonBody};
use crate::auth::{admit, admit_subject, password, TokenError, TokenKind, TokenPair};
use crate::error::{ApiError, ApiResult};
use crate::models::{Principal, Role, User, Validate};
use crate::response::Reply;
use crate::store::{new_id, StoreError};
use crate::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh));

    let protected = authenticated(
        state,
        Router::new()
            .route("/me", get(me).patch(update_me))
            .route("/password", patch(change_password)),
    );

    public.merge(protected)
}

pub(crate) fn issue_pair(state: &AppState, subject: &str) -> ApiResult<TokenPair> {
    state
        .tokens
        .issue_pair(subject)
        .map_err(|e| ApiError::Internal(e.into()))
}

/// Argon2 is deliberately slow; keep it off the async workers.
pub(crate) async fn hash_password(plain: &str) -> ApiResult<String> {
    let plain = plain.to_owned();
    tokio::task::spawn_blocking(move || password::hash(&plain))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .map_err(ApiError::Internal)
}

async fn verify_password(plain: &str, stored: Option<String>) -> ApiResult<bool> {
    let plain = plain.to_owned();
    tokio::task::spawn_blocking(move || match stored {
        Some(stored) => password::verify(&plain, &stored),
        None => {
            password::verify_dummy(&plain);
            false
        }
    })
    .await
    .map_err(|e| ApiError::Internal(e.into()))
}

/// Passwords are taken verbatim, never trimmed.
pub(crate) fn raw_password<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str).filter(|p| !p.is_empty())
}

pub(crate) fn check_password_length(plain: &str) -> ApiResult<()> {
    if plain.chars().count() < password::MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            password::MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Map a duplicate email to the user-facing conflict message.
pub(crate) fn email_taken(err: anyhow::Error) -> ApiError {
    if StoreError::is_duplicate(&err) {
        ApiError::conflict("User with this email already exists")
    } else {
        err.into()
    }
}

// ── Register / login ─────────────────────────────────────────────────────────

async fn register(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Reply> {
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
        role: Role::User,
        is_verified: false,
        is_suspended: false,
        is_active: true,
        is_deleted: false,
        created_at: now,
        updated_at: now,
    };
    user.validate()?;
    if state.store.find_user_by_email(email)?.is_some() {
        return Err(ApiError::conflict("User with this email already exists"));
    }
    user.password_hash = hash_password(plain).await?;
    state.store.create_user(&mut user).map_err(email_taken)?;

    let pair = issue_pair(&state, &user.id)?;
    info!(user_id = %user.id, "user registered");
    Ok(Reply::created("User registered successfully").data(json!({
        "user": Principal::from(&user),
        "accessToken": pair.access_token,
        "refreshToken": pair.refresh_token,
    })))
}

async fn login(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Reply> {
    let (Some(email), Some(plain)) = (
        text(&body, "email"),
        raw_password(&body, "password"),
    ) else {
        return Err(ApiError::validation("Email and password are required"));
    };

    let user = state.store.find_user_by_email(email)?;
    let stored = user.as_ref().map(|u| u.password_hash.clone());
    let matched = verify_password(plain, stored).await?;
    let Some(user) = user.filter(|_| matched) else {
        warn!("login rejected: bad credentials");
        return Err(ApiError::unauthorized("Invalid email or password"));
    };

    let principal = admit(&user).map_err(|rejection| {
        warn!(user_id = %user.id, reason = ?rejection, "login rejected by account gate");
        ApiError::from(rejection)
    })?;
    let pair = issue_pair(&state, &user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Reply::ok("Login successful").data(json!({
        "user": principal,
        "accessToken": pair.access_token,
        "refreshToken": pair.refresh_token,
    })))
}

async fn refresh(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Reply> {
    let Some(token) = text(&body, "refreshToken") else {
        return Err(ApiError::validation("Refresh token is required"));
    };
    let subject = match state.tokens.verify(token, TokenKind::Refresh) {
        Ok(subject) => subject,
        Err(e @ TokenError::MissingSecret(_)) => return Err(ApiError::Internal(e.into())),
        Err(e) => {
            warn!(reason = e.reason(), "refresh token rejected");
            return Err(ApiError::unauthorized(match e {
                TokenError::Expired => "Refresh token expired. Please login again.",
                _ => "Invalid refresh token. Please login again.",
            }));
        }
    };
    let principal = admit_subject(&state.store, &subject)?;
    let pair = issue_pair(&state, &principal.id)?;
    Ok(Reply::ok("Token refreshed successfully").data(json!({
        "accessToken": pair.access_token,
        "refreshToken": pair.refresh_token,
    })))
}

// ── Current user ─────────────────────────────────────────────────────────────

async fn me(Extension(me): Extension<Principal>) -> ApiResult<Reply> {
    Ok(Reply::ok("User retrieved successfully").data(json!({ "user": me })))
}

async fn update_me(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    let name = text(&body, "name").map(str::to_owned);
    let email = text(&body, "email").map(str::to_owned);
    if name.is_none() && email.is_none() {
        return Err(ApiError::validation("Name or email is required"));
    }

    let now = state.now();
    let updated = state
        .store
        .update_user(&me.id, |user| {
            if let Some(name) = name {
                user.name = name;
            }
            if let Some(email) = email {
                user.email = email;
            }
            user.validate()?;
            user.updated_at = now;
            Ok(())
        })
        .map_err(email_taken)?
        .ok_or_else(|| ApiError::unauthorized("User not found. Token may be invalid."))?;

    info!(user_id = %me.id, "profile updated");
    Ok(Reply::ok("Profile updated successfully")
        .data(json!({ "user": Principal::from(&updated) })))
}

async fn change_password(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    let (Some(current), Some(next)) = (
        raw_password(&body, "currentPassword"),
        raw_password(&body, "newPassword"),
    ) else {
        return Err(ApiError::validation(
            "Current password and new password are required",
        ));
    };
    check_password_length(next)?;

    let user = state
        .store
        .get::<User>(&me.id)?
        .ok_or_else(|| ApiError::unauthorized("User not found. Token may be invalid."))?;
    if !verify_password(current, Some(user.password_hash)).await? {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    let hash = hash_password(next).await?;
    let now = state.now();
    state.store.update_user(&me.id, |user| {
        user.password_hash = hash;
        user.updated_at = now;
        Ok(())
    })?;
    info!(user_id = %me.id, "password changed");
    Ok(Reply::ok("Password updated successfully"))
}
