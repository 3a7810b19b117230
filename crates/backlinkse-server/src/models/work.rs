use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{dates, Validate};
use crate::error::{ApiError, ApiResult};
use crate::store::Document;

// ── Projects ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[default]
    Active,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub links_built: u32,
    pub target_links: u32,
    #[serde(with = "dates")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "dates")]
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Project {
    const COLLECTION: &'static str = "projects";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Validate for Project {
    fn validate(&self) -> ApiResult<()> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("Project name is required"));
        }
        if self.name.chars().count() > 100 {
            return Err(ApiError::validation(
                "Project name cannot exceed 100 characters",
            ));
        }
        if self.domain.trim().is_empty() {
            return Err(ApiError::validation("Domain is required"));
        }
        if self.target_links < 1 {
            return Err(ApiError::validation("Target links must be at least 1"));
        }
        Ok(())
    }
}

impl Project {
    /// Percentage of the link target reached, uncapped.
    pub fn progress(&self) -> f64 {
        if self.target_links == 0 {
            return 0.0;
        }
        f64::from(self.links_built) / f64::from(self.target_links) * 100.0
    }
}

// ── Orders ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageType {
    LinkBuilding,
    GuestPosting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub order_number: String,
    pub package_name: String,
    pub package_type: PackageType,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub links_delivered: u32,
    pub links_total: u32,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(with = "dates")]
    pub order_date: DateTime<Utc>,
    #[serde(default, with = "dates::option", skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_currency() -> String {
    "USD".into()
}

impl Document for Order {
    const COLLECTION: &'static str = "orders";
    fn id(&self) -> &str {
        &self.id
    }
    fn unique_key(&self) -> Option<(&'static str, String)> {
        Some(("orderNumber", self.order_number.clone()))
    }
}

impl Validate for Order {
    fn validate(&self) -> ApiResult<()> {
        if self.package_name.trim().is_empty() {
            return Err(ApiError::validation("Package name is required"));
        }
        if self.links_total < 1 {
            return Err(ApiError::validation("Total links must be at least 1"));
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(ApiError::validation("Amount cannot be negative"));
        }
        Ok(())
    }
}

// ── Reports ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportType {
    Monthly,
    Quarterly,
    Yearly,
    Custom,
}

impl ReportType {
    /// Length of the reporting window in months, if the type has one.
    pub fn months(self) -> Option<u32> {
        match self {
            Self::Monthly => Some(1),
            Self::Quarterly => Some(3),
            Self::Yearly => Some(12),
            Self::Custom => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    #[default]
    #[serde(rename = "In Progress")]
    InProgress,
    Ready,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ReportType,
    #[serde(with = "dates")]
    pub report_date: DateTime<Utc>,
    #[serde(default)]
    pub links_count: u32,
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Report {
    const COLLECTION: &'static str = "reports";
    fn id(&self) -> &str {
        &self.id
    }
}

impl Validate for Report {
    fn validate(&self) -> ApiResult<()> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("Report name is required"));
        }
        Ok(())
    }
}

// ── Support tickets ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketCategory {
    Billing,
    Technical,
    Order,
    General,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub ticket_number: String,
    pub subject: String,
    pub category: TicketCategory,
    #[serde(default)]
    pub priority: TicketPriority,
    #[serde(default)]
    pub status: TicketStatus,
    pub message: String,
    #[serde(with = "dates")]
    pub last_update: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for SupportTicket {
    const COLLECTION: &'static str = "support_tickets";
    fn id(&self) -> &str {
        &self.id
    }
    fn unique_key(&self) -> Option<(&'static str, String)> {
        Some(("ticketNumber", self.ticket_number.clone()))
    }
}

impl Validate for SupportTicket {
    fn validate(&self) -> ApiResult<()> {
        if self.subject.trim().is_empty() {
            return Err(ApiError::validation("Subject is required"));
        }
        if self.subject.chars().count() > 200 {
            return Err(ApiError::validation("Subject cannot exceed 200 characters"));
        }
        if self.message.trim().is_empty() {
            return Err(ApiError::validation("Message is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::build;
    use serde_json::json;

    #[test]
    fn order_accepts_spaced_status_and_kebab_package_type() {
        let order: Order = build(
            json!({
                "orderNumber": "ORD-2025-001",
                "packageName": "Growth",
                "packageType": "guest-posting",
                "status": "In Progress",
                "linksTotal": 10,
                "amount": 3500,
                "orderDate": "2025-03-02"
            }),
            Utc::now(),
            &[("userId", json!("u1"))],
        )
        .unwrap();
        assert_eq!(order.package_type, PackageType::GuestPosting);
        assert_eq!(order.status, OrderStatus::InProgress);
        assert_eq!(order.currency, "USD");
        assert!(order.completed_date.is_none());
    }

    #[test]
    fn order_rejects_zero_links() {
        let err = build::<Order>(
            json!({
                "orderNumber": "ORD-2025-002",
                "packageName": "Growth",
                "packageType": "link-building",
                "linksTotal": 0,
                "amount": 10,
                "orderDate": "2025-03-02"
            }),
            Utc::now(),
            &[("userId", json!("u1"))],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Total links must be at least 1");
    }

    #[test]
    fn ticket_subject_length_is_capped() {
        let long = "x".repeat(201);
        let err = build::<SupportTicket>(
            json!({
                "ticketNumber": "TKT-0001",
                "subject": long,
                "category": "billing",
                "message": "help",
                "lastUpdate": "2025-03-02"
            }),
            Utc::now(),
            &[("userId", json!("u1"))],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Subject cannot exceed 200 characters");
    }

    #[test]
    fn project_progress() {
        let project: Project = build(
            json!({
                "name": "Site",
                "domain": "example.com",
                "linksBuilt": 5,
                "targetLinks": 20,
                "startDate": "2025-01-01",
                "lastActivity": "2025-01-01"
            }),
            Utc::now(),
            &[("userId", json!("u1"))],
        )
        .unwrap();
        assert_eq!(project.progress(), 25.0);
        assert_eq!(project.status, ProjectStatus::Active);
    }
}
