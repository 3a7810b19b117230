use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Router,
};
use rand::Rng;
use serde_json::json;

use super::{
    allocate, authenticated, find_owned, list_owned, only, require_fields, update_owned, JsonBody,
};
use crate::error::ApiResult;
use crate::models::work::TicketStatus;
use crate::models::{build, merge, Principal, SupportTicket};
use crate::response::Reply;
use crate::AppState;

const MISSING: &str = "Support ticket not found";

pub fn routes(state: &AppState) -> Router<AppState> {
    authenticated(
        state,
        Router::new()
            .route("/", get(list_tickets).post(create_ticket))
            .route("/{id}", get(get_ticket).patch(update_ticket)),
    )
}

fn ticket_number() -> String {
    let n: u16 = rand::thread_rng().gen_range(1000..10_000);
    format!("TKT-{n}")
}

async fn list_tickets(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
) -> ApiResult<Reply> {
    let mut tickets = list_owned::<SupportTicket>(&state, &me.id)?;
    tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Reply::ok("Support tickets retrieved successfully").data(json!({ "tickets": tickets })))
}

async fn get_ticket(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    let ticket = find_owned::<SupportTicket>(&state, &id, &me.id, MISSING)?;
    Ok(Reply::ok("Support ticket retrieved successfully").data(json!({ "ticket": ticket })))
}

async fn create_ticket(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    require_fields(
        &body,
        &["subject", "category", "message"],
        "Subject, category, and message are required",
    )?;
    let now = state.now();
    let body = only(&body, &["subject", "category", "priority", "message"]);
    let mut ticket: SupportTicket = build(
        body,
        now,
        &[
            ("userId", json!(me.id)),
            ("ticketNumber", json!(ticket_number())),
            ("status", json!(TicketStatus::Open)),
            ("lastUpdate", json!(now)),
        ],
    )?;

    let ticket = allocate(|| {
        ticket.ticket_number = ticket_number();
        state.store.insert(&ticket)?;
        Ok(ticket.clone())
    })?;

    tracing::info!(ticket = %ticket.ticket_number, user_id = %me.id, "support ticket opened");
    Ok(Reply::created("Support ticket created successfully").data(json!({ "ticket": ticket })))
}

async fn update_ticket(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    let now = state.now();
    let ticket = update_owned::<SupportTicket>(&state, &id, &me.id, MISSING, |ticket| {
        let mut updated = merge(&*ticket, &body, now, &["ticketNumber", "lastUpdate"])?;
        updated.last_update = now;
        *ticket = updated;
        Ok(())
    })?;
    Ok(Reply::ok("Support ticket updated successfully").data(json!({ "ticket": ticket })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_numbers_have_four_digits() {
        for _ in 0..50 {
            let n = ticket_number();
            assert!(n.starts_with("TKT-"));
            assert_eq!(n.len(), 8, "{n}");
        }
    }
}
