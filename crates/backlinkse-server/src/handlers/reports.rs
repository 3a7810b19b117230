use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Router,
};
use chrono::{DateTime, Months, Utc};
use serde_json::json;

use super::{
    authenticated, find_owned, list_owned, only, require_fields, update_owned, JsonBody,
};
use crate::error::ApiResult;
use crate::models::work::{ReportStatus, ReportType};
use crate::models::{build, merge, Order, Principal, Report};
use crate::response::Reply;
use crate::AppState;

const MISSING: &str = "Report not found";

pub fn routes(state: &AppState) -> Router<AppState> {
    authenticated(
        state,
        Router::new()
            .route("/", get(list_reports).post(create_report))
            .route("/{id}", get(get_report).patch(update_report)),
    )
}

/// Links delivered on orders dated inside `[start, start + months)`.
fn links_in_window(orders: &[Order], start: DateTime<Utc>, kind: ReportType) -> u32 {
    let Some(months) = kind.months() else {
        return 0;
    };
    let end = start.checked_add_months(Months::new(months));
    orders
        .iter()
        .filter(|o| o.order_date >= start && end.map_or(true, |end| o.order_date < end))
        .map(|o| o.links_delivered)
        .sum()
}

async fn list_reports(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
) -> ApiResult<Reply> {
    let mut reports = list_owned::<Report>(&state, &me.id)?;
    reports.sort_by(|a, b| b.report_date.cmp(&a.report_date));
    let ready = reports
        .iter()
        .filter(|r| r.status == ReportStatus::Ready)
        .count();
    let links: u64 = reports.iter().map(|r| u64::from(r.links_count)).sum();
    Ok(Reply::ok("Reports retrieved successfully").data(json!({
        "stats": {
            "totalReports": reports.len(),
            "readyReports": ready,
            "totalLinks": links,
        },
        "reports": reports,
    })))
}

async fn get_report(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Reply> {
    let report = find_owned::<Report>(&state, &id, &me.id, MISSING)?;
    Ok(Reply::ok("Report retrieved successfully").data(json!({ "report": report })))
}

async fn create_report(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    require_fields(
        &body,
        &["name", "type", "reportDate"],
        "Name, type, and report date are required",
    )?;
    let now = state.now();
    let body = only(&body, &["name", "type", "reportDate", "linksCount", "fileUrl"]);
    let mut report: Report = build(
        body.clone(),
        now,
        &[
            ("userId", json!(me.id)),
            ("status", json!(ReportStatus::InProgress)),
        ],
    )?;

    let given = body.get("linksCount").and_then(|v| v.as_u64()).unwrap_or(0);
    if given == 0 {
        let orders = list_owned::<Order>(&state, &me.id)?;
        report.links_count = links_in_window(&orders, report.report_date, report.kind);
    }
    state.store.insert(&report)?;

    tracing::info!(report_id = %report.id, links = report.links_count, "report created");
    Ok(Reply::created("Report created successfully").data(json!({ "report": report })))
}

async fn update_report(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Reply> {
    let now = state.now();
    let patch = only(&body, &["status", "fileUrl"]);
    let report = update_owned::<Report>(&state, &id, &me.id, MISSING, |report| {
        *report = merge(&*report, &patch, now, &[])?;
        Ok(())
    })?;
    Ok(Reply::ok("Report updated successfully").data(json!({ "report": report })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn order(day: &str, delivered: u32) -> Order {
        build(
            json!({
                "orderNumber": format!("ORD-2025-{delivered:03}"),
                "packageName": "Starter",
                "packageType": "link-building",
                "linksTotal": 50,
                "linksDelivered": delivered,
                "amount": 100,
                "orderDate": day,
            }),
            Utc::now(),
            &[("userId", json!("u"))],
        )
        .unwrap()
    }

    #[test]
    fn window_is_half_open_and_sized_by_type() {
        let orders = [
            order("2025-02-28", 1),
            order("2025-03-01", 2),
            order("2025-03-31", 4),
            order("2025-04-01", 8),
            order("2025-05-31", 16),
            order("2025-06-01", 32),
        ];
        let march = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(links_in_window(&orders, march, ReportType::Monthly), 6);
        assert_eq!(links_in_window(&orders, march, ReportType::Quarterly), 30);
        assert_eq!(links_in_window(&orders, march, ReportType::Yearly), 62);
        assert_eq!(links_in_window(&orders, march, ReportType::Custom), 0);
    }
}
