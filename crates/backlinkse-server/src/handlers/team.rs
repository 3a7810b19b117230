use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Extension, Router,
};
use serde_json::{json, Value};

use super::{authenticated, delete_owned, list_owned, require_fields, text, JsonBody};
use crate::error::{ApiError, ApiResult};
use crate::models::account::{initials, MemberStatus};
use crate::models::{build, Principal, TeamMember};
use crate::response::Reply;
use crate::store::normalize_email;
use crate::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    authenticated(
        state,
        Router::new()
            .route("/", get(list_members).post(invite_member))
            .route("/{id}", delete(remove_member)),
    )
}

fn owner_entry(me: &Principal) -> Value {
    json!({
        "name": me.name,
        "email": me.email,
        "role": "Owner",
        "initials": initials(&me.name),
    })
}

fn member_entry(member: &TeamMember) -> Value {
    let local = member.email.split('@').next().unwrap_or(&member.email);
    json!({
        "_id": member.id,
        "name": local,
        "email": member.email,
        "role": member.role,
        "initials": initials(&member.email),
        "status": member.status,
    })
}

async fn list_members(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
) -> ApiResult<Reply> {
    let mut team = list_owned::<TeamMember>(&state, &me.id)?;
    team.sort_by(|a, b| a.invited_at.cmp(&b.invited_at));
    let members: Vec<Value> = std::iter::once(owner_entry(&me))
        .chain(team.iter().map(member_entry))
        .collect();
    Ok(Reply::ok("Team members retrieved successfully").data(json!({ "members": members })))
}

async fn invite_member(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    require_fields(&body, &["email", "role"], "Email and role are required")?;
    let email = normalize_email(text(&body, "email").unwrap_or_default());
    if email == normalize_email(&me.email) {
        return Err(ApiError::validation("You cannot invite yourself"));
    }

    let now = state.now();
    let member: TeamMember = build(
        json!({ "email": email, "role": body["role"] }),
        now,
        &[
            ("userId", json!(me.id)),
            ("invitedBy", json!(me.id)),
            ("invitedAt", json!(now)),
            ("status", json!(MemberStatus::Pending)),
        ],
    )?;

    state.store.write(|txn| {
        let already = txn
            .all::<TeamMember>()?
            .iter()
            .any(|m| m.user_id == me.id && m.email == member.email);
        if already {
            return Err(ApiError::conflict("Team member already invited").into());
        }
        txn.put(&member)
    })?;

    tracing::info!(user_id = %me.id, member_id = %member.id, "team member invited");
    Ok(Reply::created("Team member invited successfully").data(json!({ "teamMember": member })))
}

async fn remove_member(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    delete_owned::<TeamMember>(&state, &id, &me.id, "Team member not found")?;
    Ok(Reply::ok("Team member removed successfully"))
}
