use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Router,
};
use serde_json::{json, Value};

use super::{
    authenticated, delete_owned, find_owned, list_owned, require_fields, update_owned, JsonBody,
};
use crate::error::ApiResult;
use crate::models::work::ProjectStatus;
use crate::models::{build, default_field, merge, Activity, Principal, Project};
use crate::response::Reply;
use crate::AppState;

const MISSING: &str = "Project not found";

pub fn routes(state: &AppState) -> Router<AppState> {
    authenticated(
        state,
        Router::new()
            .route("/", get(list_projects).post(create_project))
            .route(
                "/{id}",
                get(get_project).patch(update_project).delete(delete_project),
            ),
    )
}

fn lowercase_domain(body: &mut Value) {
    if let Some(domain) = body.get_mut("domain") {
        if let Some(lowered) = domain.as_str().map(|raw| raw.trim().to_lowercase()) {
            *domain = Value::String(lowered);
        }
    }
}

fn stats(projects: &[Project]) -> Value {
    let active = projects
        .iter()
        .filter(|p| p.status == ProjectStatus::Active)
        .count();
    let links: u64 = projects.iter().map(|p| u64::from(p.links_built)).sum();
    let avg_progress = if projects.is_empty() {
        0
    } else {
        let total: f64 = projects.iter().map(Project::progress).sum();
        (total / projects.len() as f64).round() as i64
    };
    json!({
        "totalProjects": projects.len(),
        "activeProjects": active,
        "totalLinksBuilt": links,
        "avgProgress": avg_progress,
    })
}

async fn list_projects(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
) -> ApiResult<Reply> {
    let mut projects = list_owned::<Project>(&state, &me.id)?;
    projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let summary = stats(&projects);
    Ok(Reply::ok("Projects retrieved successfully").data(json!({
        "projects": projects,
        "stats": summary,
    })))
}

async fn get_project(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    let project = find_owned::<Project>(&state, &id, &me.id, MISSING)?;
    Ok(Reply::ok("Project retrieved successfully").data(json!({ "project": project })))
}

async fn create_project(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    JsonBody(mut body): JsonBody,
) -> ApiResult<Reply> {
    require_fields(
        &body,
        &["name", "domain", "targetLinks"],
        "Name, domain, and targetLinks are required",
    )?;
    let now = state.now();
    lowercase_domain(&mut body);
    default_field(&mut body, "startDate", json!(now));
    default_field(&mut body, "lastActivity", json!(now));

    let project: Project = build(body, now, &[("userId", json!(me.id))])?;
    let activity = Activity::new(&me.id, "New project created", now)
        .site(project.domain.clone())
        .project(&project.id);
    state.store.write(|txn| {
        txn.put(&project)?;
        txn.put(&activity)
    })?;

    tracing::info!(project_id = %project.id, user_id = %me.id, "project created");
    Ok(Reply::created("Project created successfully").data(json!({ "project": project })))
}

async fn update_project(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
    JsonBody(mut body): JsonBody,
) -> ApiResult<Reply> {
    let now = state.now();
    lowercase_domain(&mut body);
    let project = update_owned::<Project>(&state, &id, &me.id, MISSING, |project| {
        let mut updated = merge(&*project, &body, now, &["lastActivity"])?;
        updated.last_activity = now;
        *project = updated;
        Ok(())
    })?;
    Ok(Reply::ok("Project updated successfully").data(json!({ "project": project })))
}

async fn delete_project(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    delete_owned::<Project>(&state, &id, &me.id, MISSING)?;
    Ok(Reply::ok("Project deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn project(built: u32, target: u32, status: &str) -> Project {
        build(
            json!({
                "name": "p",
                "domain": "x.com",
                "linksBuilt": built,
                "targetLinks": target,
                "status": status,
                "startDate": "2025-01-01",
                "lastActivity": "2025-01-01",
            }),
            Utc::now(),
            &[("userId", json!("u"))],
        )
        .unwrap()
    }

    #[test]
    fn stats_average_rounded_progress() {
        let projects = [
            project(5, 20, "Active"),
            project(10, 10, "Paused"),
            project(1, 3, "Active"),
        ];
        let summary = stats(&projects);
        assert_eq!(summary["totalProjects"], 3);
        assert_eq!(summary["activeProjects"], 2);
        assert_eq!(summary["totalLinksBuilt"], 16);
        // (25 + 100 + 33.33) / 3 = 52.78
        assert_eq!(summary["avgProgress"], 53);
        assert_eq!(stats(&[])["avgProgress"], 0);
    }

    #[test]
    fn domains_are_lowercased() {
        let mut body = json!({"domain": " Example.COM "});
        lowercase_domain(&mut body);
        assert_eq!(body["domain"], "example.com");
    }
}
