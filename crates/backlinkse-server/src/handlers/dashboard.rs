use axum::{extract::State, routing::get, Extension, Router};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde_json::{json, Value};

use super::{authenticated, list_owned};
use crate::error::ApiResult;
use crate::models::{Activity, Order, Principal};
use crate::response::Reply;
use crate::AppState;

const RECENT_ACTIVITY: usize = 10;
const TRAFFIC_VALUE_PER_LINK: f64 = 500.0;
const REPORT_DAY: u32 = 15;

pub fn routes(state: &AppState) -> Router<AppState> {
    authenticated(
        state,
        Router::new()
            .route("/stats", get(stats))
            .route("/activity", get(activity))
            .route("/campaign-progress", get(campaign_progress)),
    )
}

fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(now, |d| d.and_utc())
}

fn links_between(orders: &[Order], from: DateTime<Utc>, until: Option<DateTime<Utc>>) -> i64 {
    orders
        .iter()
        .filter(|o| o.order_date >= from && until.map_or(true, |end| o.order_date < end))
        .map(|o| i64::from(o.links_delivered))
        .sum()
}

/// `"+N this month"`: links on orders dated this month minus last month.
fn backlinks_change(orders: &[Order], now: DateTime<Utc>) -> String {
    let this_month = month_start(now);
    let last_month = this_month
        .checked_sub_months(Months::new(1))
        .unwrap_or(this_month);
    let change = links_between(orders, this_month, None)
        - links_between(orders, last_month, Some(this_month));
    format!("{change:+} this month")
}

fn avg_domain_rating(activities: &[Activity]) -> i64 {
    let ratings: Vec<f64> = activities
        .iter()
        .filter_map(|a| a.domain_rating)
        .map(f64::from)
        .collect();
    if ratings.is_empty() {
        return 0;
    }
    (ratings.iter().sum::<f64>() / ratings.len() as f64).round() as i64
}

fn dashboard_stats(orders: &[Order], activities: &[Activity], now: DateTime<Utc>) -> Value {
    let total: u64 = orders.iter().map(|o| u64::from(o.links_delivered)).sum();
    let active = orders.iter().filter(|o| o.status.is_open()).count();
    let traffic = total as f64 * TRAFFIC_VALUE_PER_LINK / 1000.0;
    json!({
        "totalBacklinks": total,
        "avgDomainRating": avg_domain_rating(activities),
        "activeCampaigns": active,
        "estTrafficValue": format!("${traffic:.1}K"),
        "backlinksChange": backlinks_change(orders, now),
    })
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    match secs {
        0..=59 => plural(secs, "second"),
        60..=3599 => plural(secs / 60, "minute"),
        3600..=86_399 => plural(secs / 3600, "hour"),
        _ => plural(secs / 86_400, "day"),
    }
}

/// The next report day on or after `now`'s date.
fn next_report_date(now: DateTime<Utc>) -> DateTime<Utc> {
    let this_month = month_start(now);
    let base = if now.day() <= REPORT_DAY {
        this_month
    } else {
        this_month
            .checked_add_months(Months::new(1))
            .unwrap_or(this_month)
    };
    base + chrono::Duration::days(i64::from(REPORT_DAY - 1))
}

async fn stats(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
) -> ApiResult<Reply> {
    let orders = list_owned::<Order>(&state, &me.id)?;
    let activities = list_owned::<Activity>(&state, &me.id)?;
    let data = dashboard_stats(&orders, &activities, state.now());
    Ok(Reply::ok("Dashboard stats retrieved successfully").data(data))
}

async fn activity(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
) -> ApiResult<Reply> {
    let now = state.now();
    let mut activities = list_owned::<Activity>(&state, &me.id)?;
    activities.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let items: Vec<Value> = activities
        .iter()
        .take(RECENT_ACTIVITY)
        .map(|a| {
            json!({
                "id": a.id,
                "action": a.action,
                "site": a.site.as_deref().unwrap_or_default(),
                "dr": a.domain_rating,
                "time": time_ago(a.created_at, now),
            })
        })
        .collect();
    Ok(Reply::ok("Recent activity retrieved successfully").data(json!({ "activities": items })))
}

async fn campaign_progress(
    State(state): State<AppState>,
    Extension(me): Extension<Principal>,
) -> ApiResult<Reply> {
    let orders = list_owned::<Order>(&state, &me.id)?;
    let Some(order) = orders
        .iter()
        .filter(|o| o.status.is_open())
        .max_by_key(|o| o.order_date)
    else {
        return Ok(Reply::ok("No active campaign").data(json!({ "campaign": null })));
    };

    let total = order.links_total.max(1);
    let progress = (f64::from(order.links_delivered) / f64::from(total) * 100.0).round() as i64;
    Ok(Reply::ok("Campaign progress retrieved successfully").data(json!({
        "campaign": {
            "name": order.package_name,
            "packageName": order.package_name,
            "progress": progress,
            "linksDelivered": order.links_delivered,
            "linksTotal": order.links_total,
            "remaining": order.links_total.saturating_sub(order.links_delivered),
            "nextReportDate": next_report_date(state.now()),
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::build;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 30, 0).unwrap()
    }

    fn order(date: DateTime<Utc>, delivered: u32, status: &str) -> Order {
        build(
            json!({
                "orderNumber": "ORD-2025-001",
                "packageName": "Growth",
                "packageType": "link-building",
                "status": status,
                "linksTotal": 40,
                "linksDelivered": delivered,
                "amount": 900,
                "orderDate": date,
            }),
            date,
            &[("userId", json!("u"))],
        )
        .unwrap()
    }

    #[test]
    fn change_is_signed_against_last_month() {
        let now = at(2025, 4, 10);
        let orders = [
            order(at(2025, 3, 2), 10, "Completed"),
            order(at(2025, 4, 1), 4, "In Progress"),
        ];
        assert_eq!(backlinks_change(&orders, now), "-6 this month");

        let orders = [order(at(2025, 4, 3), 7, "Pending")];
        assert_eq!(backlinks_change(&orders, now), "+7 this month");
        assert_eq!(backlinks_change(&[], now), "+0 this month");
    }

    #[test]
    fn stats_summarise_orders_and_ratings() {
        let now = at(2025, 4, 10);
        let orders = [
            order(at(2025, 4, 1), 12, "In Progress"),
            order(at(2025, 1, 1), 30, "Completed"),
        ];
        let activities = [
            Activity::new("u", "a", now).domain_rating(50),
            Activity::new("u", "b", now).domain_rating(61),
            Activity::new("u", "c", now),
        ];
        let data = dashboard_stats(&orders, &activities, now);
        assert_eq!(data["totalBacklinks"], 42);
        assert_eq!(data["activeCampaigns"], 1);
        assert_eq!(data["estTrafficValue"], "$21.0K");
        assert_eq!(data["avgDomainRating"], 56);
        assert_eq!(avg_domain_rating(&[]), 0);
    }

    #[test]
    fn relative_times_pluralise() {
        let now = at(2025, 4, 10);
        assert_eq!(time_ago(now - Duration::seconds(5), now), "5 seconds ago");
        assert_eq!(time_ago(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(time_ago(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(time_ago(now - Duration::days(1), now), "1 day ago");
        assert_eq!(time_ago(now + Duration::days(1), now), "0 seconds ago");
    }

    #[test]
    fn report_date_is_next_fifteenth() {
        let expect = |y, m| Utc.with_ymd_and_hms(y, m, 15, 0, 0, 0).unwrap();
        assert_eq!(next_report_date(at(2025, 4, 10)), expect(2025, 4));
        assert_eq!(next_report_date(at(2025, 4, 15)), expect(2025, 4));
        assert_eq!(next_report_date(at(2025, 4, 16)), expect(2025, 5));
        assert_eq!(next_report_date(at(2025, 12, 31)), expect(2026, 1));
    }
}
